//! Where program output goes: the process stdout, or an in-memory buffer
//! for embedding and tests.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

#[derive(Clone, Debug, Default)]
pub enum Output {
    #[default]
    Stdout,
    Buffer(Rc<RefCell<String>>),
}

impl Output {
    pub fn buffer() -> Self {
        Output::Buffer(Rc::new(RefCell::new(String::new())))
    }

    pub fn write_str(&self, text: &str) -> io::Result<()> {
        match self {
            Output::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(text.as_bytes())?;
                out.flush()
            }
            Output::Buffer(buf) => {
                buf.borrow_mut().push_str(text);
                Ok(())
            }
        }
    }

    /// Captured text; always empty for stdout.
    pub fn contents(&self) -> String {
        match self {
            Output::Stdout => String::new(),
            Output::Buffer(buf) => buf.borrow().clone(),
        }
    }

    pub fn clear(&self) {
        if let Output::Buffer(buf) = self {
            buf.borrow_mut().clear();
        }
    }
}

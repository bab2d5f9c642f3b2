use std::fmt;

use smol_str::SmolStr;

/// One step into the document tree: a map key or a list index.
#[derive(Debug, Clone, PartialEq)]
pub enum PathElement {
    Key(SmolStr),
    Index(usize),
}

/// An address of a value in the document, built up from the root.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path(Vec<PathElement>);

impl Path {
    pub fn root() -> Path {
        Path(Vec::new())
    }

    pub fn key<S: Into<SmolStr>>(mut self, key: S) -> Path {
        self.0.push(PathElement::Key(key.into()));
        self
    }

    pub fn index(mut self, index: usize) -> Path {
        self.0.push(PathElement::Index(index));
        self
    }

    /// The path of the object containing the addressed value.
    pub fn parent(&self) -> Path {
        let mut elements = self.0.clone();
        elements.pop();
        Path(elements)
    }

    pub(crate) fn from_elements(elements: Vec<PathElement>) -> Path {
        Path(elements)
    }

    /// The final component, if this is not the root path.
    pub(crate) fn name(&self) -> Option<&PathElement> {
        self.0.last()
    }

    pub(crate) fn elements(&self) -> &[PathElement] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::Key(key) => write!(f, "{}", key),
            PathElement::Index(index) => write!(f, "{}", index),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/")?;
        let mut first = true;
        for element in &self.0 {
            if !first {
                write!(f, "/")?;
            }
            write!(f, "{}", element)?;
            first = false;
        }
        Ok(())
    }
}

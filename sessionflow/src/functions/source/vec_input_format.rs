use std::fmt::{Debug, Formatter};

use crate::api::element::Element;
use crate::api::error::DecodeError;
use crate::api::function::{Context, InputFormat, NamedFunction};

/// A finite in-memory source, read once in order.
pub fn vec_source<K, V>(data: Vec<Element<K, V>>) -> VecInputFormat<K, V> {
    VecInputFormat::new(data)
}

pub struct VecInputFormat<K, V> {
    data: Option<Vec<Element<K, V>>>,
    iter: Option<std::vec::IntoIter<Element<K, V>>>,
}

impl<K, V> VecInputFormat<K, V> {
    pub fn new(data: Vec<Element<K, V>>) -> Self {
        VecInputFormat {
            data: Some(data),
            iter: None,
        }
    }
}

impl<K, V> InputFormat<K, V> for VecInputFormat<K, V> {
    fn open(&mut self, _context: &Context) -> crate::api::Result<()> {
        let data = self.data.take().unwrap_or_default();
        self.iter = Some(data.into_iter());
        Ok(())
    }

    fn next_element(&mut self) -> Option<Result<Element<K, V>, DecodeError>> {
        self.iter.as_mut().and_then(|iter| iter.next()).map(Ok)
    }

    fn close(&mut self) -> crate::api::Result<()> {
        self.iter = None;
        Ok(())
    }
}

impl<K, V> NamedFunction for VecInputFormat<K, V> {
    fn name(&self) -> &str {
        "VecInputFormat"
    }
}

impl<K, V> Debug for VecInputFormat<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VecInputFormat")
            .field("opened", &self.iter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::api::element::Element;
    use crate::api::function::{Context, InputFormat};
    use crate::functions::source::{vec_source, VecInputFormat};

    fn drain(source: &mut VecInputFormat<String, u64>) -> Vec<u64> {
        source.open(&Context::default()).unwrap();
        let mut values = Vec::new();
        while let Some(element) = source.next_element() {
            values.push(element.unwrap().value);
        }
        source.close().unwrap();
        values
    }

    #[test]
    pub fn vec_source_test() {
        let data: Vec<Element<String, u64>> = (0..5)
            .map(|i| Element::new("k".to_string(), i, i * 10))
            .collect();
        let mut source = vec_source(data);
        assert_eq!(drain(&mut source), vec![0, 1, 2, 3, 4]);

        // the data is handed out once
        assert!(drain(&mut source).is_empty());
    }
}

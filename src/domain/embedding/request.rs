//! Embedding request

/// Texts to embed with one model. The response carries one vector per
/// text, indexed by position.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRequest {
    model: String,
    inputs: Vec<String>,
}

impl EmbeddingRequest {
    pub fn batch(model: impl Into<String>, inputs: Vec<String>) -> Self {
        Self {
            model: model.into(),
            inputs,
        }
    }

    pub fn single(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self::batch(model, vec![text.into()])
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    /// Number of vectors a provider must return
    pub fn expected_vectors(&self) -> usize {
        self.inputs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_is_a_one_element_batch() {
        let request = EmbeddingRequest::single("text-embedding-3-small", "hello");

        assert_eq!(request, EmbeddingRequest::batch("text-embedding-3-small", vec!["hello".into()]));
        assert_eq!(request.expected_vectors(), 1);
    }
}

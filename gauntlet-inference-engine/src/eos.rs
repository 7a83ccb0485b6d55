/// End-of-sequence handling for checkpoints that declare one, several, or no
/// EOS token ids.
#[derive(Debug, Clone)]
pub enum EosTokenHandler {
    Single(u32),
    Multiple(Vec<u32>),
    None,
}

impl EosTokenHandler {
    pub fn is_eos_token(&self, token_id: u32) -> bool {
        match self {
            EosTokenHandler::Single(id) => token_id == *id,
            EosTokenHandler::Multiple(ids) => ids.contains(&token_id),
            EosTokenHandler::None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_eos_token() {
        let handler = EosTokenHandler::Single(2);

        assert!(handler.is_eos_token(2));
        assert!(!handler.is_eos_token(3));
    }

    #[test]
    fn test_multiple_eos_tokens() {
        let handler = EosTokenHandler::Multiple(vec![128001, 128009]);

        assert!(handler.is_eos_token(128001));
        assert!(handler.is_eos_token(128009));
        assert!(!handler.is_eos_token(0));
    }

    #[test]
    fn test_no_eos_token() {
        let handler = EosTokenHandler::None;

        assert!(!handler.is_eos_token(0));
        assert!(!handler.is_eos_token(u32::MAX));
    }
}

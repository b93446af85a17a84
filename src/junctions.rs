use crate::framework::*;

/// Keeps games carrying engine evaluations and sets aside bullet games.
///
/// Both checks are plain substring searches over the whole record, so the
/// cost is linear in the record length and nothing is parsed.
#[derive(Debug, Clone)]
pub struct ContentFilter {
    eval_marker: String,
    bullet_marker: String,
}

impl ContentFilter {
    pub fn new(eval_marker: impl Into<String>, bullet_marker: impl Into<String>) -> Self {
        Self {
            eval_marker: eval_marker.into(),
            bullet_marker: bullet_marker.into(),
        }
    }

    /// `true` if the record has an eval and is not a bullet game.
    pub fn accepts(&self, record: &str) -> bool {
        self.route(record) == Route::Keep
    }

    pub fn route(&self, record: &str) -> Route {
        if !record.contains(&self.eval_marker) {
            Route::Drop
        } else if record.contains(&self.bullet_marker) {
            Route::Divert
        } else {
            Route::Keep
        }
    }
}

impl Junction for ContentFilter {
    type Input = String;

    fn split(&self, input: &FlowFile<Self::Input>) -> Route {
        self.route(&input.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_BULLET_MARKER, DEFAULT_EVAL_MARKER};

    use std::sync::Arc;

    fn filter() -> ContentFilter {
        ContentFilter::new(DEFAULT_EVAL_MARKER, DEFAULT_BULLET_MARKER)
    }

    const BLITZ_EVAL: &str = "[Event \"Rated Blitz game\"]\n\n1. e4 { [%eval 0.17] } 1-0\n";
    const BULLET_EVAL: &str = "[Event \"Rated Bullet game\"]\n\n1. e4 { [%eval 0.17] } 1-0\n";
    const BULLET_PLAIN: &str = "[Event \"Rated Bullet game\"]\n\n1. e4 1-0\n";
    const BLITZ_PLAIN: &str = "[Event \"Rated Blitz game\"]\n\n1. e4 { [%clk 0:03:00] } 1-0\n";

    #[test]
    fn test_accepts_eval_without_bullet() {
        assert!(filter().accepts(BLITZ_EVAL));
    }

    #[test]
    fn test_rejects_bullet_regardless_of_eval() {
        assert!(!filter().accepts(BULLET_EVAL));
        assert!(!filter().accepts(BULLET_PLAIN));
    }

    #[test]
    fn test_rejects_missing_eval() {
        assert!(!filter().accepts(BLITZ_PLAIN));
        assert!(!filter().accepts(""));
    }

    #[test]
    fn test_routes() {
        let f = filter();
        let route = |text: &str| f.split(&FlowFile::new(text.to_string(), Arc::from("mem")));
        assert_eq!(route(BLITZ_EVAL), Route::Keep);
        assert_eq!(route(BULLET_EVAL), Route::Divert);
        assert_eq!(route(BULLET_PLAIN), Route::Drop);
        assert_eq!(route(BLITZ_PLAIN), Route::Drop);
    }

    #[test]
    fn test_custom_markers() {
        let f = ContentFilter::new("%eval", "UltraBullet");
        assert!(f.accepts(BULLET_EVAL));
        assert!(!f.accepts("[Event \"Rated UltraBullet game\"] { [%eval 1.0] }"));
    }
}

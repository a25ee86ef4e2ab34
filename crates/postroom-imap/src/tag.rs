//! Command tag generation.
//!
//! Tags match commands with their tagged responses.

/// Sequential tag generator, producing `P0001`, `P0002`, ...
#[derive(Debug, Default, Clone)]
pub struct TagGenerator {
    counter: u32,
}

impl TagGenerator {
    /// Creates a new generator starting at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self { counter: 0 }
    }

    /// Generates the next tag.
    pub fn next(&mut self) -> String {
        self.counter = self.counter.wrapping_add(1);
        format!("P{:04}", self.counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_tags() {
        let mut tags = TagGenerator::new();
        assert_eq!(tags.next(), "P0001");
        assert_eq!(tags.next(), "P0002");
        assert_eq!(tags.next(), "P0003");
    }

    #[test]
    fn padding_grows_past_four_digits() {
        let mut tags = TagGenerator { counter: 9998 };
        assert_eq!(tags.next(), "P9999");
        assert_eq!(tags.next(), "P10000");
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HallucinationConfig {
    pub char_run_threshold: usize,
    pub max_pattern_len: usize,
    pub pattern_repeat_threshold: usize,
}

impl Default for HallucinationConfig {
    fn default() -> Self {
        Self {
            char_run_threshold: 31,
            max_pattern_len: 5,
            pattern_repeat_threshold: 16,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HallucinationFilter {
    config: HallucinationConfig,
}

impl HallucinationFilter {
    pub fn new(config: HallucinationConfig) -> Self {
        Self { config }
    }

    pub fn is_hallucination(&self, text: &str) -> bool {
        let chars: Vec<char> = text.chars().collect();
        has_char_run(&chars, self.config.char_run_threshold)
            || has_repeated_pattern(
                &chars,
                self.config.max_pattern_len,
                self.config.pattern_repeat_threshold,
            )
    }
}

fn has_char_run(chars: &[char], threshold: usize) -> bool {
    let threshold = threshold.max(2);
    let mut run = 0;
    let mut previous = None;

    for &c in chars {
        if previous == Some(c) {
            run += 1;
        } else {
            run = 1;
            previous = Some(c);
        }
        if run >= threshold {
            return true;
        }
    }

    false
}

// A unit of length `len` repeated `k` times is a stretch of `(k - 1) * len`
// positions where each char equals the one `len` further on.
fn has_repeated_pattern(chars: &[char], max_len: usize, repeats: usize) -> bool {
    let repeats = repeats.max(2);

    (1..=max_len).any(|len| {
        let needed = (repeats - 1) * len;
        if chars.len() < needed + len {
            return false;
        }

        let mut streak = 0;
        for j in 0..chars.len() - len {
            if chars[j] == chars[j + len] {
                streak += 1;
                if streak >= needed {
                    return true;
                }
            } else {
                streak = 0;
            }
        }
        false
    })
}

//! Backend-independent beam search over decoder logits

use crate::core::errors::{Result, TranslationError};

/// A partial or finished decoder sequence and its summed log-probability
#[derive(Debug, Clone)]
struct Hypothesis {
    tokens: Vec<u32>,
    score: f32,
}

/// Beam search parameters
#[derive(Debug, Clone)]
pub struct BeamSearch {
    /// Beam width; 1 is greedy decoding
    pub num_beams: usize,
    /// Maximum sequence length, decoder start token included
    pub max_length: usize,
    /// Exponent on length when ranking finished hypotheses
    pub length_penalty: f32,
    /// First token fed to the decoder
    pub decoder_start_token_id: u32,
    /// Token that ends a hypothesis
    pub eos_token_id: u32,
    /// Tokens that may never be generated, e.g. padding
    pub suppressed: Vec<u32>,
    /// Only token allowed right after the start token, e.g. a target-language tag
    pub forced_bos_token_id: Option<u32>,
    /// Only token allowed at the last position before `max_length`
    pub forced_eos_token_id: Option<u32>,
}

impl BeamSearch {
    fn normalized(&self, score: f32, len: usize) -> f32 {
        score / (len as f32).powf(self.length_penalty)
    }

    /// Run beam search.
    ///
    /// `step` receives every live sequence (all of equal length) and must return
    /// the next-token logits for each of them, in the same order. The result is
    /// the best sequence without the start token and without the EOS token.
    pub fn run<F>(&self, mut step: F) -> Result<Vec<u32>>
    where
        F: FnMut(&[Vec<u32>]) -> Result<Vec<Vec<f32>>>,
    {
        let num_beams = self.num_beams.max(1);
        let mut live = vec![Hypothesis {
            tokens: vec![self.decoder_start_token_id],
            score: 0.0,
        }];
        let mut finished: Vec<(Hypothesis, f32)> = Vec::new();

        while !live.is_empty() {
            let cur_len = live[0].tokens.len();
            if cur_len >= self.max_length {
                break;
            }

            let sequences: Vec<Vec<u32>> = live.iter().map(|h| h.tokens.clone()).collect();
            let logits = step(&sequences)?;
            if logits.len() != live.len() {
                return Err(TranslationError::GenerationError {
                    message: format!(
                        "decoder returned {} rows for {} beams",
                        logits.len(),
                        live.len()
                    ),
                });
            }

            let mut candidates: Vec<(f32, usize, u32)> = Vec::new();
            for (beam, row) in logits.iter().enumerate() {
                let mut log_probs = self.log_softmax(row);
                self.force(cur_len, &mut log_probs);
                for (token, log_prob) in top_k(&log_probs, 2 * num_beams) {
                    candidates.push((live[beam].score + log_prob, beam, token));
                }
            }
            candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

            let mut next = Vec::with_capacity(num_beams);
            for (rank, (score, beam, token)) in candidates.into_iter().enumerate() {
                if token == self.eos_token_id {
                    // EOS ranked outside the beam width is not a real contender
                    if rank < num_beams {
                        let hyp = Hypothesis {
                            tokens: live[beam].tokens.clone(),
                            score,
                        };
                        let norm = self.normalized(score, cur_len);
                        finished.push((hyp, norm));
                    }
                } else {
                    let mut tokens = live[beam].tokens.clone();
                    tokens.push(token);
                    next.push(Hypothesis { tokens, score });
                }

                if next.len() == num_beams {
                    break;
                }
            }

            finished.sort_by(|a, b| b.1.total_cmp(&a.1));
            finished.truncate(num_beams);
            live = next;

            if finished.len() == num_beams {
                let worst_finished = finished[num_beams - 1].1;
                let best_live = live
                    .iter()
                    .map(|h| self.normalized(h.score, cur_len + 1))
                    .fold(f32::NEG_INFINITY, f32::max);
                if best_live <= worst_finished {
                    break;
                }
            }
        }

        for hyp in live {
            let norm = self.normalized(hyp.score, hyp.tokens.len());
            finished.push((hyp, norm));
        }

        let best = finished
            .into_iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(hyp, _)| hyp.tokens.into_iter().skip(1).collect())
            .unwrap_or_default();

        Ok(best)
    }

    /// Pin the next token when the position calls for a forced BOS or EOS
    fn force(&self, cur_len: usize, log_probs: &mut [f32]) {
        let forced = if cur_len == 1 {
            self.forced_bos_token_id
        } else if cur_len + 1 == self.max_length {
            self.forced_eos_token_id
        } else {
            None
        };

        if let Some(token) = forced.filter(|&t| (t as usize) < log_probs.len()) {
            log_probs.fill(f32::NEG_INFINITY);
            log_probs[token as usize] = 0.0;
        }
    }

    fn log_softmax(&self, logits: &[f32]) -> Vec<f32> {
        let mut masked = logits.to_vec();
        for &token in &self.suppressed {
            if let Some(slot) = masked.get_mut(token as usize) {
                *slot = f32::NEG_INFINITY;
            }
        }

        let max = masked.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if !max.is_finite() {
            return masked;
        }
        let log_sum = masked.iter().map(|&x| (x - max).exp()).sum::<f32>().ln() + max;
        masked.iter().map(|&x| x - log_sum).collect()
    }
}

/// Indices and values of the `k` largest finite entries, best first
fn top_k(values: &[f32], k: usize) -> Vec<(u32, f32)> {
    let mut indexed: Vec<(u32, f32)> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(i, &v)| (i as u32, v))
        .collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
    indexed.truncate(k);
    indexed
}

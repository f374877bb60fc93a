// Human-like pacing between browser actions

use std::time::Duration;

use rand::Rng;

use crate::port::{BrowserError, BrowserSession};

#[derive(Debug, Clone)]
pub struct Pacer {
    enabled: bool,
    action_delay_ms: (u64, u64),
    keystroke_delay_ms: (u64, u64),
}

impl Default for Pacer {
    fn default() -> Self {
        Self::human()
    }
}

impl Pacer {
    /// Randomized pauses between actions and between typed chunks
    pub fn human() -> Self {
        Self {
            enabled: true,
            action_delay_ms: (400, 1_200),
            keystroke_delay_ms: (40, 160),
        }
    }

    /// No pauses; text is typed in one go
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            action_delay_ms: (0, 0),
            keystroke_delay_ms: (0, 0),
        }
    }

    fn jitter((low, high): (u64, u64)) -> Duration {
        // ThreadRng is !Send; never hold it across an await
        let ms = rand::thread_rng().gen_range(low..=high.max(low));
        Duration::from_millis(ms)
    }

    pub async fn pause(&self) {
        if self.enabled {
            tokio::time::sleep(Self::jitter(self.action_delay_ms)).await;
        }
    }

    /// Clear the field, then type `text` in small randomized chunks
    pub async fn type_into(
        &self,
        session: &dyn BrowserSession,
        selector: &str,
        text: &str,
    ) -> Result<(), BrowserError> {
        session.clear(selector).await?;
        if !self.enabled {
            return session.send_keys(selector, text).await;
        }

        let chars: Vec<char> = text.chars().collect();
        let mut start = 0;
        while start < chars.len() {
            let len = rand::thread_rng().gen_range(1..=3usize);
            let end = (start + len).min(chars.len());
            let chunk: String = chars[start..end].iter().collect();
            session.send_keys(selector, &chunk).await?;
            tokio::time::sleep(Self::jitter(self.keystroke_delay_ms)).await;
            start = end;
        }
        Ok(())
    }
}

use std::time::Duration;

pub const RESTART_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Once,
    Retry {
        max_attempts: Option<u32>,
        delay: Duration,
    },
    Restart { delay: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Complete(i32),
    Again(Duration),
}

impl Policy {
    pub fn restart() -> Self {
        Policy::Restart {
            delay: RESTART_DELAY,
        }
    }

    pub fn after_attempt(&self, attempt: u32, exit_code: i32) -> Step {
        if exit_code == 0 {
            return Step::Complete(0);
        }

        match *self {
            Policy::Once => Step::Complete(exit_code),
            Policy::Retry {
                max_attempts: Some(max),
                ..
            } if attempt >= max => Step::Complete(exit_code),
            Policy::Retry { delay, .. } | Policy::Restart { delay } => Step::Again(delay),
        }
    }
}

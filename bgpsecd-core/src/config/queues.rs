use serde::Deserialize;

fn default_capacity() -> usize {
    1024
}

/// `[queues]` (§4.4, §6). `disable_*` select the synchronous/"experimental"
/// mode where PDUs are processed directly on the socket task instead of
/// being handed to a worker.
#[derive(Debug, Deserialize, Clone)]
pub struct QueueConfig {
    #[serde(default = "default_capacity")]
    pub receive_capacity: usize,
    #[serde(default = "default_capacity")]
    pub send_capacity: usize,
    #[serde(default)]
    pub disable_receive_queue: bool,
    #[serde(default)]
    pub disable_send_queue: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            receive_capacity: default_capacity(),
            send_capacity: default_capacity(),
            disable_receive_queue: false,
            disable_send_queue: false,
        }
    }
}

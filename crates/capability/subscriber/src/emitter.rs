use domain::WireRecord;
use tokio::sync::mpsc;
use tracing::warn;

/// 下游数据流接收端（发出即忘）。
pub trait WireEmitter: Send + Sync {
    fn emit(&self, record: WireRecord);
}

/// 基于无界通道的下游接收端。
#[derive(Debug, Clone)]
pub struct ChannelEmitter {
    sender: mpsc::UnboundedSender<WireRecord>,
}

impl ChannelEmitter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WireRecord>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl WireEmitter for ChannelEmitter {
    fn emit(&self, record: WireRecord) {
        if let Err(err) = self.sender.send(record) {
            warn!(
                target: "wire.subscriber",
                fields = err.0.len(),
                "downstream_closed"
            );
        }
    }
}

pub mod loopback;
pub mod receiver;
pub mod sender;

pub use loopback::LocalLoopback;
pub use receiver::SocketReceiver;
pub use sender::SocketSender;

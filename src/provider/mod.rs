pub use self::{evm::Evm, http::HTTP};

pub mod evm;
pub mod http;

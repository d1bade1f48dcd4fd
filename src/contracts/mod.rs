pub mod erc3009;

pub use erc3009::Erc3009Token;

pub mod completion;
pub mod mint_worker;

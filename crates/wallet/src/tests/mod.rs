mod fixtures;
mod signer;

pub mod decode_service;
pub mod decoder;
pub mod request;

pub use self::decode_service::DecodeService;
pub use self::decoder::{FileTileDecoder, TileDecoder};
pub use self::request::{RequestCompletion, RequestHandle, TileRequester};

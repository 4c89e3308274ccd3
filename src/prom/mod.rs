mod model;
pub use self::model::Envelope;
pub use self::model::Labels;
pub use self::model::ResultItem;
pub use self::model::Sample;
pub(crate) mod parser;
pub use self::parser::decode_envelope;
pub use self::parser::parse_response;

mod error;
pub use self::error::QueryError;

mod client;
pub use self::client::percent_encode;
pub use self::client::query_url;
pub use self::client::PromClient;

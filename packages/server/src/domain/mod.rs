//! Domain layer.
//!
//! 値オブジェクト、ルームの状態機械、メッセージスキーマ、そして Infrastructure 層が
//! 実装するポート（trait）を定義します。

pub mod content;
pub mod entity;
pub mod error;
pub mod keys;
pub mod message;
pub mod relay;
pub mod renderer;
pub mod store;
pub mod value_object;

pub use content::ContentGenerator;
#[cfg(test)]
pub use content::MockContentGenerator;
pub use entity::{Departure, Phase, ReadySignal, RoomDetail, RoomState, ScoreLine, shuffle_candidates};
pub use error::{BarrierError, ContentError, RelayError, StoreError, ValueObjectError};
pub use message::{ClientEvent, GameMessage, RelayEvent, RelayMessage};
pub use relay::{RelayBus, Subscription};
pub use renderer::FragmentRenderer;
pub use store::StateStore;
pub use value_object::{ConnectionId, RoomId, RoomIdFactory, UserId, UserIdFactory, Username};

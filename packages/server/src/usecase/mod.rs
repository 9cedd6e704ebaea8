//! UseCase layer.
//!
//! クライアントアクター、ルームコーディネーター、ルームレジストリ、
//! そして HTTP API 向けの読み取りユースケースを提供します。

pub mod client_actor;
pub mod error;
pub mod get_room_detail;
pub mod room_coordinator;
pub mod room_registry;
pub mod services;

pub use client_actor::{ClientActor, DispatchOutcome};
pub use error::{ClientError, CoordinatorError, GetRoomDetailError};
pub use get_room_detail::GetRoomDetailUseCase;
pub use room_coordinator::RoomCoordinator;
pub use room_registry::RoomRegistry;
pub use services::GameServices;

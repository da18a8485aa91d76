//! Domain layer
//!
//! エンティティ、値オブジェクト、エラー、および外部協調者（イベント通知、
//! 永続化、ICE 設定）へのインターフェースを定義します。

pub mod entity;
pub mod error;
pub mod event;
pub mod provider;
pub mod repository;
pub mod value_object;

pub use entity::{
    CollaborationMode, GuestInfo, GuestRequest, GuestStatus, IceServerConfig, JoinResult,
    Permission, Session, SessionConfig, SessionGuest, SessionStatus,
};
pub use error::{ErrorKind, RepositoryError, SessionError, ValueObjectError};
pub use event::{AuditEvent, EventEmitter, names as event_names};
pub use provider::IceServerProvider;
pub use repository::{SessionSnapshot, SessionStore};
pub use value_object::{JoinCode, SessionId, SessionIdFactory, Timestamp};

//! Infrastructure layer
//!
//! ドメイン層が定義するインターフェース（イベント通知、永続化、ICE 設定）の
//! 具体的な実装と、HTTP の DTO を提供します。

pub mod dto;
pub mod event_emitter;
pub mod ice;
pub mod repository;

use thiserror::Error;

/// The taxonomy every kernel-visible failure collapses into. Evaluators,
/// the store, the matcher and the pools each have their own narrower error
/// type that `From`-converts into this one so `?` composes across layers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KernelError {
  #[error("not found: {kind} {key}")]
  NotFound { kind: &'static str, key: String },

  #[error("unauthorized: {reason}")]
  Unauthorized { reason: String },

  #[error("precondition violated: {reason}")]
  PreconditionViolated { reason: String },

  #[error("invariant violated: {reason}")]
  Invariant { reason: String },

  #[error("expired: {what} at {at}, now is {now}")]
  Expired { what: &'static str, at: u64, now: u64 },

  #[error("consensus error: {reason}")]
  ConsensusError { reason: String },
}

impl KernelError {
  pub fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
    KernelError::NotFound { kind, key: key.into() }
  }

  pub fn unauthorized(reason: impl Into<String>) -> Self {
    KernelError::Unauthorized { reason: reason.into() }
  }

  pub fn precondition(reason: impl Into<String>) -> Self {
    KernelError::PreconditionViolated { reason: reason.into() }
  }

  pub fn invariant(reason: impl Into<String>) -> Self {
    KernelError::Invariant { reason: reason.into() }
  }
}

pub type KernelResult<T> = Result<T, KernelError>;

/// Errors surfaced by the object store itself, below the evaluator layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
  #[error("record already exists: {kind} {key}")]
  AlreadyExists { kind: &'static str, key: String },

  #[error("record not found: {kind} {key}")]
  NotFound { kind: &'static str, key: String },

  #[error("no undo session is active")]
  NoActiveSession,
}

impl From<StoreError> for KernelError {
  fn from(e: StoreError) -> Self {
    match e {
      StoreError::AlreadyExists { kind, key } => {
        KernelError::precondition(format!("{kind} {key} already exists"))
      }
      StoreError::NotFound { kind, key } => KernelError::not_found(kind, key),
      StoreError::NoActiveSession => KernelError::invariant("no undo session is active"),
    }
  }
}

/// Errors from the authority/signature verification layer (§4.2).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthorityError {
  #[error("missing authority: {0}")]
  MissingAuthority(String),

  #[error("signature is not required by any authority")]
  IrrelevantSignature,

  #[error("more signatures supplied than keys in play")]
  TooManySignatures,

  #[error("account authority recursion exceeded depth {0}")]
  SignatureDepthExceeded(u8),

  #[error("posting and active/owner authorities cannot be required in the same transaction")]
  MixedAuthorityLevels,
}

impl From<AuthorityError> for KernelError {
  fn from(e: AuthorityError) -> Self {
    match e {
      AuthorityError::MissingAuthority(s) => KernelError::unauthorized(s),
      AuthorityError::IrrelevantSignature => {
        KernelError::unauthorized("irrelevant signature supplied")
      }
      AuthorityError::TooManySignatures => {
        KernelError::unauthorized("too many signatures supplied")
      }
      AuthorityError::SignatureDepthExceeded(d) => {
        KernelError::unauthorized(format!("signature depth exceeded: {d}"))
      }
      AuthorityError::MixedAuthorityLevels => KernelError::unauthorized(
        "cannot mix posting authority with active/owner authority in one transaction",
      ),
    }
  }
}

/// Errors from the order matching engine (§4.5).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MatchError {
  #[error("fill-or-kill order could not be fully filled")]
  FillOrKillUnfilled,

  #[error("order book invariant violated: {0}")]
  BookInvariant(String),
}

impl From<MatchError> for KernelError {
  fn from(e: MatchError) -> Self {
    match e {
      MatchError::FillOrKillUnfilled => {
        KernelError::precondition("fill-or-kill order could not be fully filled")
      }
      MatchError::BookInvariant(s) => KernelError::invariant(s),
    }
  }
}

//! Background work owned by the cache. Currently only the notifier that
//! delivers eviction callbacks off the caller's thread.

pub(crate) mod notifier;

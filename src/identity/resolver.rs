use rand::Rng;

use crate::{
    config::TrackingConfig,
    identity::traits::{KeyValueStore, StorageScope},
    logging::debug_log,
};

pub const SESSION_ID_KEY: &str = "zp_session_id";
pub const VISITOR_ID_KEY: &str = "zp_user_id";
pub const OPT_OUT_KEY: &str = "zp_opt_out";

pub const SESSION_ID_PREFIX: &str = "sess_";
pub const VISITOR_ID_PREFIX: &str = "user_";

const ID_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Visitor and session identifiers for one page load. Never mutated, only
/// replaced wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitorIdentity {
    pub visitor_id: String,
    pub session_id: String,
    /// False when storage was unavailable and the ids only live in memory
    /// for this page load.
    pub persisted: bool,
}

/// Why no identity was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    OptedOut,
    DoNotTrack,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityResolution {
    Resolved(VisitorIdentity),
    Suppressed(Suppression),
}

/// Generates `prefix + millis + '_' + 9 random base36 chars`. Uniqueness is
/// best effort; ids group analytics, they are not secrets.
pub fn generate_id<R: Rng + ?Sized>(
    prefix: &str,
    now_millis: i64,
    rng: &mut R,
) -> String {
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{prefix}{now_millis}_{suffix}")
}

/// Checks that `id` has the shape produced by [`generate_id`].
pub fn is_generated_id(id: &str, prefix: &str) -> bool {
    let Some(rest) = id.strip_prefix(prefix) else {
        return false;
    };
    let Some((millis, suffix)) = rest.split_once('_') else {
        return false;
    };
    !millis.is_empty()
        && millis.bytes().all(|b| b.is_ascii_digit())
        && suffix.len() == ID_SUFFIX_LEN
        && suffix.bytes().all(|b| BASE36.contains(&b))
}

/// Reads the persisted opt-out preference.
pub fn read_opt_out<S: KeyValueStore>(storage: &S) -> Result<bool, S::Error> {
    let flag = storage.get_item(StorageScope::Local, OPT_OUT_KEY)?;
    Ok(flag.as_deref() == Some("true"))
}

/// Persists or clears the opt-out preference.
pub fn write_opt_out<S: KeyValueStore>(
    storage: &mut S,
    opted_out: bool,
) -> Result<(), S::Error> {
    if opted_out {
        storage.set_item(StorageScope::Local, OPT_OUT_KEY, "true")
    } else {
        storage.remove_item(StorageScope::Local, OPT_OUT_KEY)
    }
}

/// Resolves the visitor identity for this page load.
///
/// Returns [`IdentityResolution::Suppressed`] without touching storage
/// beyond the opt-out read when the visitor opted out or Do-Not-Track is
/// set. Storage failures never abort resolution: the affected id is
/// generated and kept in memory only.
pub fn resolve_identity<S, R>(
    config: &TrackingConfig,
    storage: &mut S,
    do_not_track: bool,
    now_millis: i64,
    rng: &mut R,
) -> IdentityResolution
where
    S: KeyValueStore,
    R: Rng + ?Sized,
{
    let debug = config.debug_logging;

    match read_opt_out(storage) {
        Ok(true) => {
            debug_log!(debug, "visitor opted out, tracking disabled");
            return IdentityResolution::Suppressed(Suppression::OptedOut);
        }
        Ok(false) => {}
        Err(e) => {
            debug_log!(debug, "cannot read opt-out preference: {e}");
        }
    }

    if do_not_track {
        debug_log!(debug, "Do Not Track detected, tracking disabled");
        return IdentityResolution::Suppressed(Suppression::DoNotTrack);
    }

    let session_scope = if config.cookieless_mode {
        StorageScope::Session
    } else {
        StorageScope::Local
    };

    let (session_id, session_persisted) = load_or_create(
        storage,
        session_scope,
        SESSION_ID_KEY,
        SESSION_ID_PREFIX,
        now_millis,
        rng,
        debug,
    );
    let (visitor_id, visitor_persisted) = load_or_create(
        storage,
        StorageScope::Local,
        VISITOR_ID_KEY,
        VISITOR_ID_PREFIX,
        now_millis,
        rng,
        debug,
    );

    let identity = VisitorIdentity {
        visitor_id,
        session_id,
        persisted: session_persisted && visitor_persisted,
    };
    debug_log!(debug, "session initialized: {identity:?}");
    IdentityResolution::Resolved(identity)
}

fn load_or_create<S, R>(
    storage: &mut S,
    scope: StorageScope,
    key: &str,
    prefix: &str,
    now_millis: i64,
    rng: &mut R,
    debug: bool,
) -> (String, bool)
where
    S: KeyValueStore,
    R: Rng + ?Sized,
{
    match storage.get_item(scope, key) {
        Ok(Some(existing)) if !existing.is_empty() => return (existing, true),
        Ok(_) => {}
        Err(e) => {
            debug_log!(debug, "cannot read {key}, keeping it in memory: {e}");
            return (generate_id(prefix, now_millis, rng), false);
        }
    }

    let id = generate_id(prefix, now_millis, rng);
    match storage.set_item(scope, key, &id) {
        Ok(()) => (id, true),
        Err(e) => {
            debug_log!(debug, "cannot persist {key}, keeping it in memory: {e}");
            (id, false)
        }
    }
}

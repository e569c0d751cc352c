//! Translation of daemon errors into session errors.

use tracing::warn;

use crate::error::{EngineError, SessionError};

/// Status the daemon uses for name and resource conflicts on create.
pub const CONFLICT_STATUS: u16 = 409;

/// Map an error from a container create/run call.
///
/// A 409 becomes [`SessionError::CreateConflict`]; every other error is
/// passed through unchanged.
pub fn translate_run_error(err: EngineError) -> SessionError {
    match err {
        EngineError::Api {
            status_code,
            message,
        } if status_code == CONFLICT_STATUS => {
            warn!("Container create conflict: {}", message);
            SessionError::CreateConflict {
                message,
                status_code,
            }
        }
        other => SessionError::Engine(other),
    }
}

/// Turn a daemon "not found" on a lookup into `None`, keep other errors.
pub fn absorb_not_found<T>(result: Result<Option<T>, EngineError>) -> Result<Option<T>, EngineError> {
    match result {
        Err(e) if e.is_not_found() => Ok(None),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_becomes_create_conflict() {
        let err = translate_run_error(EngineError::Api {
            status_code: 409,
            message: "name in use".into(),
        });

        match err {
            SessionError::CreateConflict {
                message,
                status_code,
            } => {
                assert_eq!(status_code, 409);
                assert_eq!(message, "name in use");
            }
            other => panic!("Expected CreateConflict, got {:?}", other),
        }
    }

    #[test]
    fn test_other_errors_pass_through() {
        let err = translate_run_error(EngineError::Api {
            status_code: 500,
            message: "boom".into(),
        });
        assert!(matches!(
            err,
            SessionError::Engine(EngineError::Api { status_code: 500, .. })
        ));

        let err = translate_run_error(EngineError::Transport("eof".into()));
        assert!(matches!(err, SessionError::Engine(EngineError::Transport(_))));
    }

    #[test]
    fn test_absorb_not_found() {
        let missing: Result<Option<u8>, _> = Err(EngineError::Api {
            status_code: 404,
            message: "No such container".into(),
        });
        assert!(absorb_not_found(missing).unwrap().is_none());

        let failing: Result<Option<u8>, _> = Err(EngineError::NotAvailable("down".into()));
        assert!(absorb_not_found(failing).is_err());
    }
}

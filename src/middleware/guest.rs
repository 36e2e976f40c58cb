use super::GuardOutcome;
use crate::context::{AppContext, Navigation, RouteLocation};
use crate::error::AuthError;

/// Guard for pages that only make sense while anonymous (login, register).
/// Authenticated visitors are sent to the `on_guest_only` target; a disabled
/// target denies with 403 instead.
pub fn guest_guard(ctx: &AppContext, _to: &RouteLocation) -> Result<GuardOutcome, AuthError> {
    if ctx.user().is_none() {
        return Ok(GuardOutcome::Allow);
    }

    let options = ctx.options();

    let Some(target) = &options.redirect.on_guest_only else {
        return Err(AuthError::config("`redirect.on_guest_only` is not configured"));
    };

    let Some(path) = target.as_path() else {
        return Ok(GuardOutcome::Deny { status: 403 });
    };

    Ok(GuardOutcome::Redirect(Navigation::to(path).replacing()))
}

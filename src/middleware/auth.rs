use super::GuardOutcome;
use crate::context::{AppContext, Navigation, RouteLocation};
use crate::error::AuthError;
use crate::utils::formatter::trim_trailing_slash;

/// Guard for pages that require an identity. Anonymous visitors are sent to
/// the `on_auth_only` target; a disabled target denies with 403 instead.
pub fn auth_guard(ctx: &AppContext, to: &RouteLocation) -> Result<GuardOutcome, AuthError> {
    if ctx.user().is_some() {
        return Ok(GuardOutcome::Allow);
    }

    let options = ctx.options();

    let Some(target) = &options.redirect.on_auth_only else {
        return Err(AuthError::config("`redirect.on_auth_only` is not configured"));
    };

    let Some(path) = target.as_path() else {
        return Ok(GuardOutcome::Deny { status: 403 });
    };

    let mut navigation = Navigation::to(path).replacing();
    if options.redirect.keep_requested_route {
        navigation = navigation.with_query("redirect", trim_trailing_slash(&to.full_path));
    }

    Ok(GuardOutcome::Redirect(navigation))
}

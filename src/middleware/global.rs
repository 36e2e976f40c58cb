use super::GuardOutcome;
use crate::context::{AppContext, Navigation, RouteLocation};
use crate::error::AuthError;
use crate::utils::formatter::trim_trailing_slash;

/// The single app-wide guard, used instead of the named auth/guest guards.
/// Requires both redirect targets to be real paths: the login page doubles
/// as the guest-only page, `on_guest_only` is where authenticated visitors
/// belong.
///
/// Bypass rules, in order: unmatched routes when `allow_404_without_auth`
/// is set, then routes flagged as excluded.
pub fn global_guard(ctx: &AppContext, to: &RouteLocation) -> Result<GuardOutcome, AuthError> {
    let options = ctx.options();

    let home_page = options
        .redirect
        .on_guest_only
        .as_ref()
        .and_then(|target| target.as_path());
    let Some(home_page) = home_page else {
        return Err(AuthError::config(
            "you must define `redirect.on_guest_only` when using the global middleware",
        ));
    };

    let login_page = options
        .redirect
        .on_auth_only
        .as_ref()
        .and_then(|target| target.as_path());
    let Some(login_page) = login_page else {
        return Err(AuthError::config(
            "you must define `redirect.on_auth_only` when using the global middleware",
        ));
    };

    if options.global_middleware.allow_404_without_auth && !to.matched {
        return Ok(GuardOutcome::Allow);
    }

    if to.meta.excluded {
        return Ok(GuardOutcome::Allow);
    }

    let page_for_guests_only =
        trim_trailing_slash(&to.path) == login_page || to.meta.guest_only;

    if ctx.user().is_some() {
        if page_for_guests_only {
            return Ok(GuardOutcome::Redirect(Navigation::to(home_page).replacing()));
        }

        return Ok(GuardOutcome::Allow);
    }

    if page_for_guests_only {
        return Ok(GuardOutcome::Allow);
    }

    let mut navigation = Navigation::to(login_page).replacing();
    if options.redirect.keep_requested_route {
        navigation = navigation.with_query("redirect", trim_trailing_slash(&to.full_path));
    }

    Ok(GuardOutcome::Redirect(navigation))
}

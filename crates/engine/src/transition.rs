//! Transition resolution: picking the target state for a performed
//! action and response.

use waymark_model::StateTransition;

/// The first transition whose action/response filters match and whose
/// (already resolved) condition holds. Declaration order decides ties;
/// unresolved conditions never match.
pub(crate) fn match_transition<'a>(
    transitions: &'a [StateTransition],
    action: &str,
    response: &str,
) -> Option<&'a StateTransition> {
    transitions.iter().find(|transition| {
        transition.matches_action(action)
            && transition.matches_response(response)
            && transition.condition.value().copied().unwrap_or(false)
    })
}

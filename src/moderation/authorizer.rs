//! Authorization checks for moderation actions
//!
//! Checks run in a fixed order and stop at the first failure. Later checks
//! assume the earlier ones passed, e.g. rank comparisons assume membership.

use crate::moderation::platform::{GuildHierarchy, MemberInfo};
use crate::moderation::{Denial, ModerationRequest};

/// Decide whether `request` may be applied given the current `hierarchy`.
///
/// # Errors
/// Returns the first [`Denial`] hit, in this order: membership, owner, self,
/// requester rank, bot rank.
pub fn authorize(request: &ModerationRequest, hierarchy: &GuildHierarchy) -> Result<(), Denial> {
    let target = hierarchy.target.as_ref();

    if target.is_none() && !request.action.operates_outside_roster() {
        return Err(Denial::NotMember);
    }

    if target.is_some_and(|member| member.user_id == hierarchy.owner_id) {
        return Err(Denial::TargetIsOwner);
    }

    if request.target_id == request.requester_id {
        return Err(Denial::SelfTarget);
    }

    if let (Some(target), Some(requester)) = (target, hierarchy.requester.as_ref()) {
        if outranks(target, requester) {
            return Err(Denial::OutranksRequester);
        }
    }

    if let Some(target) = target {
        if !can_interact(&hierarchy.bot, target, hierarchy.owner_id) {
            return Err(Denial::OutranksBot);
        }
    }

    Ok(())
}

/// `member`'s highest role sits above `other`'s. Members without roles never compare.
fn outranks(member: &MemberInfo, other: &MemberInfo) -> bool {
    match (member.top_role, other.top_role) {
        (Some(mine), Some(theirs)) => mine > theirs,
        _ => false,
    }
}

/// Whether `actor` is structurally able to act on `target`
fn can_interact(actor: &MemberInfo, target: &MemberInfo, owner_id: u64) -> bool {
    if actor.user_id == owner_id {
        return true;
    }
    if target.user_id == owner_id {
        return false;
    }
    match (actor.top_role, target.top_role) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(mine), Some(theirs)) => mine > theirs,
    }
}

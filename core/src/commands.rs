//! The command boundary (component F): validates caller preconditions and
//! routes a command to the right [`PlayerHandle`] method.
//!
//! This is deliberately thin — per spec §4.F the actual command dispatch
//! (slash commands, text commands, whatever surface a caller builds) lives
//! outside this crate. What lives here is the one list of preconditions
//! every caller needs enforced identically: "is the caller in a voice room",
//! "is the bot in the same room", "is something currently playing", plus the
//! supplemental DJ-role and channel-restriction gates from the original bot.

use crate::error::{ChorusError, ChorusResult};
use crate::player::PlayerHandle;
use crate::settings::GuildSettings;
use crate::voice::VoiceRoomId;

/// Identity and context a caller brings to a command invocation.
pub struct CallerContext {
    pub guild_id: String,
    pub caller_voice_room: Option<VoiceRoomId>,
    pub text_channel_id: String,
    pub caller_roles: Vec<String>,
}

/// Which preconditions a given command requires. Each command site builds
/// one of these and calls [`check_preconditions`] before touching the player.
#[derive(Default)]
pub struct Preconditions {
    pub requires_caller_in_voice_room: bool,
    pub requires_same_room_as_bot: bool,
    pub requires_playing: bool,
}

/// Validates `ctx` against `prereqs` and the guild's supplemental settings.
/// The bot's current voice room, when connected, is `bot_room`; `is_playing`
/// reports whether the player has a current track.
pub fn check_preconditions(
    ctx: &CallerContext,
    prereqs: &Preconditions,
    settings: &GuildSettings,
    bot_room: Option<&VoiceRoomId>,
    is_playing: bool,
) -> ChorusResult<()> {
    if prereqs.requires_caller_in_voice_room && ctx.caller_voice_room.is_none() {
        return Err(ChorusError::PreconditionFailed(
            "you must be in a voice channel".into(),
        ));
    }

    if prereqs.requires_same_room_as_bot {
        match (&ctx.caller_voice_room, bot_room) {
            (Some(caller), Some(bot)) if caller != bot => {
                return Err(ChorusError::PreconditionFailed(
                    "you must be in the same voice channel as the bot".into(),
                ));
            }
            _ => {}
        }
    }

    if prereqs.requires_playing && !is_playing {
        return Err(ChorusError::PreconditionFailed("nothing is playing".into()));
    }

    if let Some(role) = &settings.dj_role {
        if !ctx.caller_roles.iter().any(|r| r == role) {
            return Err(ChorusError::PreconditionFailed(format!(
                "this command requires the '{role}' role"
            )));
        }
    }

    if let Some(channel) = &settings.allowed_text_channel {
        if channel != &ctx.text_channel_id {
            return Err(ChorusError::PreconditionFailed(
                "commands are restricted to a different channel in this server".into(),
            ));
        }
    }

    Ok(())
}

/// Convenience wrapper bundling a player handle with its current settings and
/// bot room, so call sites don't have to re-fetch them for every command.
pub struct CommandGateway<'a> {
    pub player: &'a PlayerHandle,
    pub settings: GuildSettings,
    pub bot_room: Option<VoiceRoomId>,
    pub is_playing: bool,
}

impl<'a> CommandGateway<'a> {
    pub fn check(&self, ctx: &CallerContext, prereqs: &Preconditions) -> ChorusResult<()> {
        check_preconditions(
            ctx,
            prereqs,
            &self.settings,
            self.bot_room.as_ref(),
            self.is_playing,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> CallerContext {
        CallerContext {
            guild_id: "g1".into(),
            caller_voice_room: Some(VoiceRoomId("room-a".into())),
            text_channel_id: "chan-1".into(),
            caller_roles: vec!["member".into()],
        }
    }

    #[test]
    fn rejects_caller_outside_voice_room() {
        let mut context = ctx();
        context.caller_voice_room = None;
        let prereqs = Preconditions {
            requires_caller_in_voice_room: true,
            ..Default::default()
        };
        let result = check_preconditions(&context, &prereqs, &GuildSettings::default(), None, false);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_caller_in_different_room_than_bot() {
        let context = ctx();
        let prereqs = Preconditions {
            requires_same_room_as_bot: true,
            ..Default::default()
        };
        let bot_room = VoiceRoomId("room-b".into());
        let result =
            check_preconditions(&context, &prereqs, &GuildSettings::default(), Some(&bot_room), false);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_missing_dj_role() {
        let context = ctx();
        let mut settings = GuildSettings::default();
        settings.dj_role = Some("DJ".into());
        let result =
            check_preconditions(&context, &Preconditions::default(), &settings, None, false);
        assert!(result.is_err());
    }

    #[test]
    fn allows_when_no_constraints_set() {
        let context = ctx();
        let result = check_preconditions(
            &context,
            &Preconditions::default(),
            &GuildSettings::default(),
            None,
            false,
        );
        assert!(result.is_ok());
    }
}

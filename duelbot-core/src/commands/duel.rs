//! Handlers for the duel commands.

use async_trait::async_trait;
use kanau::processor::Processor;

use super::{CommandContext, CommandError, CommandHandler};
use crate::events::{UserRef, Weapon};
use crate::processors::{
    AbortDuels, AcceptDuel, ChooseWeapon, DuelEngine, StartDuel, WithdrawDuels,
};

const DUEL_USAGE: &str = "Usage: !duel [@user] <wager>";
const ABORT_USAGE: &str = "Usage: !abortduel <user>";

/// `!duel [@user] <wager>`
pub struct DuelHandler;

#[async_trait]
impl CommandHandler for DuelHandler {
    async fn handle(&self, engine: &DuelEngine, ctx: CommandContext) -> Result<(), CommandError> {
        let channel = ctx.channel.ok_or(CommandError::ChannelOnly)?;
        let (target, wager) = match ctx.args.as_slice() {
            [wager] => (None, wager),
            [target, wager] => (Some(UserRef::new(target.as_str())), wager),
            _ => return Err(CommandError::Usage(DUEL_USAGE)),
        };
        let wager = wager
            .parse::<i64>()
            .map_err(|_| CommandError::Usage(DUEL_USAGE))?;

        engine
            .process(StartDuel {
                channel: channel.to_string(),
                initiator: ctx.user,
                target,
                wager,
            })
            .await?;
        Ok(())
    }
}

/// `!accept`
pub struct AcceptHandler;

#[async_trait]
impl CommandHandler for AcceptHandler {
    async fn handle(&self, engine: &DuelEngine, ctx: CommandContext) -> Result<(), CommandError> {
        let channel = ctx.channel.ok_or(CommandError::ChannelOnly)?;
        engine
            .process(AcceptDuel {
                channel: channel.to_string(),
                user: ctx.user,
            })
            .await?;
        Ok(())
    }
}

/// `!rock`, `!paper` and `!scissors`, told apart only by `weapon`.
pub struct WeaponHandler {
    pub weapon: Weapon,
}

#[async_trait]
impl CommandHandler for WeaponHandler {
    async fn handle(&self, engine: &DuelEngine, ctx: CommandContext) -> Result<(), CommandError> {
        let whispered = ctx.is_whisper();
        let Ok(_) = engine
            .process(ChooseWeapon {
                user: ctx.user,
                weapon: self.weapon,
                whispered,
            })
            .await;
        Ok(())
    }
}

/// `!cancelduel`
pub struct CancelDuelHandler;

#[async_trait]
impl CommandHandler for CancelDuelHandler {
    async fn handle(&self, engine: &DuelEngine, ctx: CommandContext) -> Result<(), CommandError> {
        let Ok(_) = engine.process(WithdrawDuels { user: ctx.user }).await;
        Ok(())
    }
}

/// `!abortduel <user>`, for moderators.
pub struct AbortDuelHandler;

#[async_trait]
impl CommandHandler for AbortDuelHandler {
    async fn handle(&self, engine: &DuelEngine, ctx: CommandContext) -> Result<(), CommandError> {
        let [user] = ctx.args.as_slice() else {
            return Err(CommandError::Usage(ABORT_USAGE));
        };
        let Ok(_) = engine
            .process(AbortDuels {
                moderator: ctx.user.clone(),
                user: UserRef::new(user.as_str()),
            })
            .await;
        Ok(())
    }
}

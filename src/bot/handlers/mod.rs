pub mod callback;
pub mod general_message;
pub mod message;

use teloxide::{
    dispatching::{UpdateFilterExt, UpdateHandler},
    prelude::*,
    types::ChatMemberUpdated,
};

use crate::bot::commands::Command;
use crate::bot::tracking::track_chat;
use crate::bot::{BotContext, HandlerError, HandlerResult};

pub struct BotHandler {
    pub context: BotContext,
}

impl BotHandler {
    pub fn new(context: BotContext) -> Self {
        Self { context }
    }

    pub fn schema(&self) -> UpdateHandler<HandlerError> {
        let command_ctx = self.context.clone();
        let message_ctx = self.context.clone();
        let callback_ctx = self.context.clone();
        let member_ctx = self.context.clone();

        dptree::entry()
            .branch(
                Update::filter_message()
                    .filter_command::<Command>()
                    .endpoint(move |bot: Bot, msg: Message, cmd: Command| {
                        let ctx = command_ctx.clone();
                        async move { message::command_handler(bot, msg, cmd, ctx).await }
                    }),
            )
            .branch(Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
                let ctx = message_ctx.clone();
                async move { general_message::handle_general_message(bot, msg, ctx).await }
            }))
            .branch(Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
                let ctx = callback_ctx.clone();
                async move { callback::callback_handler(bot, q, ctx).await }
            }))
            .branch(Update::filter_my_chat_member().endpoint(move |update: ChatMemberUpdated| {
                let ctx = member_ctx.clone();
                async move {
                    track_chat(&ctx.db, &update.chat).await;
                    HandlerResult::Ok(())
                }
            }))
    }
}

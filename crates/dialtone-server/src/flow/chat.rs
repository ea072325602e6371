//! Spoken chat and keypad text entry. Both feed the same AI conversation.

use super::{CallEvent, CallFlow, FlowError, Input, Step};
use crate::t9;
use crate::twiml::{Gather, GatherInput, VoiceResponse};
use dialtone_types::keys::{self, TEXT_SUBMIT};
use dialtone_types::{CallMode, Turn};
use std::time::Instant;

impl CallFlow {
    pub(super) async fn chat(
        &self,
        event: &CallEvent,
        now: Instant,
    ) -> Result<VoiceResponse, FlowError> {
        match &event.input {
            Input::Digits(d) if d == keys::ENTER_MUSIC => self.enter_music(event, now),
            Input::Speech(text) => {
                let reply = self.converse(&event.call_id, text, now).await?;
                Ok(self.chat_prompt(Some(&reply)))
            }
            _ => Ok(self.chat_prompt(None)),
        }
    }

    pub(super) async fn text_entry(
        &self,
        event: &CallEvent,
        now: Instant,
    ) -> Result<VoiceResponse, FlowError> {
        let Some(chunk) = event.digits() else {
            return Ok(self.text_prompt(None));
        };

        let call_id = &event.call_id;
        let buffered = self.session(call_id, now, |s| {
            if s.pending_input.is_empty() && chunk == keys::ENTER_MUSIC {
                return None;
            }
            s.pending_input.push_str(chunk);
            Some(s.pending_input.clone())
        })?;
        let Some(buffered) = buffered else {
            return self.enter_music(event, now);
        };

        let Some((message, rest)) = buffered.split_once(TEXT_SUBMIT) else {
            let so_far = t9::decode(&buffered);
            let lead = if so_far.trim().is_empty() {
                "Nothing typed yet.".to_string()
            } else {
                format!("So far: {}.", so_far)
            };
            return Ok(self.text_prompt(Some(&lead)));
        };

        // Keys typed after the pound start the next message.
        let text = t9::decode(message);
        self.session(call_id, now, |s| s.pending_input = rest.to_string())?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(self.text_prompt(Some("There was nothing to send.")));
        }

        tracing::debug!(call_id = %call_id, text, "decoded keypad message");
        let reply = self.converse(call_id, text, now).await?;
        Ok(self.text_prompt(Some(&reply)))
    }

    /// Sends `text` to the assistant with the call's transcript and records
    /// both sides of the exchange on success.
    async fn converse(&self, call_id: &str, text: &str, now: Instant) -> Result<String, FlowError> {
        let transcript = self.session(call_id, now, |s| s.transcript.clone())?;
        let reply = self.assistant.reply(&transcript, text).await?;

        self.session(call_id, now, |s| {
            s.transcript.push(Turn::user(text));
            s.transcript.push(Turn::assistant(reply.clone()));
        })?;
        tracing::info!(call_id, turns = transcript.len() + 2, "assistant replied");
        Ok(reply)
    }

    fn enter_music(&self, event: &CallEvent, now: Instant) -> Result<VoiceResponse, FlowError> {
        self.session(&event.call_id, now, |s| {
            s.pending_input.clear();
            s.mode = CallMode::Music;
        })?;
        Ok(self.music_menu_prompt(None))
    }

    pub(super) fn chat_prompt(&self, lead: Option<&str>) -> VoiceResponse {
        let gather = Gather::new(GatherInput::SpeechAndDtmf, Step::Chat.path())
            .num_digits(1)
            .timeout(6);
        let gather = match lead {
            Some(lead) => gather.say(lead),
            None => gather.say("Go ahead, I'm listening."),
        };
        self.response().gather(gather).redirect(Step::Chat.path())
    }

    pub(super) fn text_prompt(&self, lead: Option<&str>) -> VoiceResponse {
        let gather = Gather::new(GatherInput::Dtmf, Step::TextEntry.path())
            .timeout(5)
            .finish_on_key("");
        let gather = match lead {
            Some(lead) => gather.say(lead),
            None => gather.say("Type your message, then press pound to send."),
        };
        self.response()
            .gather(gather)
            .redirect(Step::TextEntry.path())
    }
}

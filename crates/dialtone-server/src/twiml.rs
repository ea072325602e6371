//! Response renderer: TwiML documents returned to the telephony provider.
//!
//! Each webhook answer is one `<Response>` holding the verbs the provider
//! executes in order. Only the verbs the call flow needs are modelled.

use axum::{
    http::header,
    response::{IntoResponse, Response},
};

/// What a `<Gather>` listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatherInput {
    Dtmf,
    Speech,
    SpeechAndDtmf,
}

impl GatherInput {
    fn as_str(self) -> &'static str {
        match self {
            Self::Dtmf => "dtmf",
            Self::Speech => "speech",
            Self::SpeechAndDtmf => "speech dtmf",
        }
    }
}

/// Collects the caller's next input and posts it to `action`.
#[derive(Debug, Clone, PartialEq)]
pub struct Gather {
    pub input: GatherInput,
    pub action: String,
    pub num_digits: Option<u32>,
    pub timeout_seconds: u32,
    /// `Some("")` disables the finish key so `#` reaches the webhook.
    pub finish_on_key: Option<String>,
    pub speech_timeout: Option<String>,
    /// Prompt verbs played while listening (`Say`, `Play`, `Pause` only).
    pub prompt: Vec<Verb>,
}

impl Gather {
    pub fn new(input: GatherInput, action: impl Into<String>) -> Self {
        Self {
            input,
            action: action.into(),
            num_digits: None,
            timeout_seconds: 5,
            finish_on_key: None,
            speech_timeout: match input {
                GatherInput::Dtmf => None,
                _ => Some("auto".to_string()),
            },
            prompt: Vec::new(),
        }
    }

    pub fn num_digits(mut self, n: u32) -> Self {
        self.num_digits = Some(n);
        self
    }

    pub fn timeout(mut self, seconds: u32) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn finish_on_key(mut self, key: impl Into<String>) -> Self {
        self.finish_on_key = Some(key.into());
        self
    }

    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.prompt.push(Verb::Say(text.into()));
        self
    }

    pub fn play(mut self, url: impl Into<String>) -> Self {
        self.prompt.push(Verb::Play(url.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verb {
    Say(String),
    Play(String),
    Pause(u32),
    Redirect(String),
    Gather(Gather),
    Hangup,
}

/// A complete TwiML document.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceResponse {
    voice: String,
    language: String,
    verbs: Vec<Verb>,
}

impl VoiceResponse {
    pub fn new(voice: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            voice: voice.into(),
            language: language.into(),
            verbs: Vec::new(),
        }
    }

    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.verbs.push(Verb::Say(text.into()));
        self
    }

    pub fn play(mut self, url: impl Into<String>) -> Self {
        self.verbs.push(Verb::Play(url.into()));
        self
    }

    pub fn pause(mut self, seconds: u32) -> Self {
        self.verbs.push(Verb::Pause(seconds));
        self
    }

    pub fn redirect(mut self, route: impl Into<String>) -> Self {
        self.verbs.push(Verb::Redirect(route.into()));
        self
    }

    pub fn gather(mut self, gather: Gather) -> Self {
        self.verbs.push(Verb::Gather(gather));
        self
    }

    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    pub fn verbs(&self) -> &[Verb] {
        &self.verbs
    }

    /// All text spoken by the document, including gather prompts, joined by
    /// spaces.
    pub fn spoken_text(&self) -> String {
        fn collect<'a>(verbs: &'a [Verb], out: &mut Vec<&'a str>) {
            for verb in verbs {
                match verb {
                    Verb::Say(text) => out.push(text),
                    Verb::Gather(g) => collect(&g.prompt, out),
                    _ => {}
                }
            }
        }
        let mut out = Vec::new();
        collect(&self.verbs, &mut out);
        out.join(" ")
    }

    /// URLs played by the document, including inside gathers.
    pub fn played_urls(&self) -> Vec<&str> {
        let mut urls = Vec::new();
        for verb in &self.verbs {
            match verb {
                Verb::Play(url) => urls.push(url.as_str()),
                Verb::Gather(g) => urls.extend(g.prompt.iter().filter_map(|v| match v {
                    Verb::Play(url) => Some(url.as_str()),
                    _ => None,
                })),
                _ => {}
            }
        }
        urls
    }

    /// The route of the final `Redirect`, if any.
    pub fn redirect_target(&self) -> Option<&str> {
        self.verbs.iter().rev().find_map(|v| match v {
            Verb::Redirect(route) => Some(route.as_str()),
            _ => None,
        })
    }

    /// The action of the first `Gather`, if any.
    pub fn gather_action(&self) -> Option<&str> {
        self.verbs.iter().find_map(|v| match v {
            Verb::Gather(g) => Some(g.action.as_str()),
            _ => None,
        })
    }

    pub fn is_hangup(&self) -> bool {
        self.verbs.iter().any(|v| matches!(v, Verb::Hangup))
    }

    /// Renders the document as XML.
    pub fn render(&self) -> String {
        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><Response>"#);
        for verb in &self.verbs {
            self.render_verb(verb, &mut xml);
        }
        xml.push_str("</Response>");
        xml
    }

    fn render_verb(&self, verb: &Verb, xml: &mut String) {
        match verb {
            Verb::Say(text) => xml.push_str(&format!(
                r#"<Say voice="{}" language="{}">{}</Say>"#,
                escape(&self.voice),
                escape(&self.language),
                escape(text)
            )),
            Verb::Play(url) => xml.push_str(&format!("<Play>{}</Play>", escape(url))),
            Verb::Pause(seconds) => xml.push_str(&format!(r#"<Pause length="{}"/>"#, seconds)),
            Verb::Redirect(route) => xml.push_str(&format!(
                r#"<Redirect method="POST">{}</Redirect>"#,
                escape(route)
            )),
            Verb::Hangup => xml.push_str("<Hangup/>"),
            Verb::Gather(gather) => {
                xml.push_str(&format!(
                    r#"<Gather input="{}" action="{}" method="POST" timeout="{}" language="{}""#,
                    gather.input.as_str(),
                    escape(&gather.action),
                    gather.timeout_seconds,
                    escape(&self.language)
                ));
                if let Some(n) = gather.num_digits {
                    xml.push_str(&format!(r#" numDigits="{}""#, n));
                }
                if let Some(key) = &gather.finish_on_key {
                    xml.push_str(&format!(r#" finishOnKey="{}""#, escape(key)));
                }
                if let Some(timeout) = &gather.speech_timeout {
                    xml.push_str(&format!(r#" speechTimeout="{}""#, escape(timeout)));
                }
                xml.push('>');
                for inner in &gather.prompt {
                    self.render_verb(inner, xml);
                }
                xml.push_str("</Gather>");
            }
        }
    }
}

impl IntoResponse for VoiceResponse {
    fn into_response(self) -> Response {
        ([(header::CONTENT_TYPE, "text/xml; charset=utf-8")], self.render()).into_response()
    }
}

/// Escapes text for XML content and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if c.is_control() && c != '\n' && c != '\t' => {}
            c => out.push(c),
        }
    }
    out
}

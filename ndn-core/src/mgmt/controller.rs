//! Issue signed management commands through a face and interpret the replies.

use std::time::Duration;

use super::command::ControlCommand;
use super::parameters::ControlParameters;
use super::response::ControlResponse;
use crate::config::FaceConfig;
use crate::face::{Face, FaceError};
use crate::name::Name;
use crate::pit::{InterestHandler, PendingInterestId};
use crate::protocol::{Data, Interest, Nack, NackReason};
use crate::signer::SigningInfo;
use crate::tlv::Element;

/// Failure code reported for a command that timed out.
pub const ERROR_TIMEOUT: u32 = 10060;
/// Failure code reported for a command answered by a network Nack.
pub const ERROR_NACK: u32 = 10800;
/// Failure code reported for an unusable response.
pub const ERROR_SERVER: u32 = 500;
/// Status codes from here up are failures.
pub const ERROR_LBOUND: u32 = 400;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("request timed out")]
    Timeout,
    #[error("network Nack received ({0})")]
    NetworkNack(NackReason),
    /// Unparsable or invalid response.
    #[error("{0}")]
    Server(String),
    /// Status code at or above [`ERROR_LBOUND`].
    #[error("{code} {text}")]
    Application { code: u32, text: String },
}

impl CommandError {
    pub fn code(&self) -> u32 {
        match self {
            CommandError::Timeout => ERROR_TIMEOUT,
            CommandError::NetworkNack(_) => ERROR_NACK,
            CommandError::Server(_) => ERROR_SERVER,
            CommandError::Application { code, .. } => *code,
        }
    }

    pub fn text(&self) -> String {
        match self {
            CommandError::Timeout => "request timed out".to_owned(),
            CommandError::NetworkNack(_) => "network Nack received".to_owned(),
            CommandError::Server(message) => message.clone(),
            CommandError::Application { text, .. } => text.clone(),
        }
    }
}

/// Where, how long, and signed by whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOptions {
    pub prefix: Name,
    pub timeout: Duration,
    pub signing: SigningInfo,
}

impl CommandOptions {
    pub fn from_config(config: &FaceConfig) -> Self {
        Self {
            prefix: config.command_prefix.clone(),
            timeout: config.command_timeout(),
            signing: SigningInfo::Digest,
        }
    }

    pub fn with_prefix(mut self, prefix: Name) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_signing(mut self, signing: SigningInfo) -> Self {
        self.signing = signing;
        self
    }
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self::from_config(&FaceConfig::default())
    }
}

/// Turn a command reply into result parameters.
///
/// Content must hold a ControlResponse. Codes at or above [`ERROR_LBOUND`]
/// fail with the forwarder's code and text; otherwise the body must decode as
/// ControlParameters and pass the command's response validation, else the
/// command fails with [`ERROR_SERVER`].
pub fn process_response(
    command: &dyn ControlCommand,
    data: &Data,
) -> Result<ControlParameters, CommandError> {
    let response = Element::parse(&data.content)
        .and_then(|element| ControlResponse::from_element(&element))
        .map_err(|e| CommandError::Server(e.to_string()))?;
    tracing::debug!(
        name = %data.name,
        code = response.code,
        text = %response.text,
        "command response"
    );
    if response.code >= ERROR_LBOUND {
        return Err(CommandError::Application {
            code: response.code,
            text: response.text,
        });
    }
    let body = response
        .body
        .ok_or_else(|| CommandError::Server("response has no body".to_owned()))?;
    let parameters =
        ControlParameters::from_element(&body).map_err(|e| CommandError::Server(e.to_string()))?;
    command
        .validate_response(&parameters)
        .map_err(|e| CommandError::Server(e.to_string()))?;
    Ok(parameters)
}

type OnSuccess = Box<dyn FnOnce(&mut Face, ControlParameters)>;
type OnFailure = Box<dyn FnOnce(&mut Face, CommandError)>;

struct CommandHandler<Cmd> {
    command: Cmd,
    parameters: ControlParameters,
    prefix: Name,
    on_success: OnSuccess,
    on_failure: OnFailure,
}

impl<Cmd: ControlCommand> CommandHandler<Cmd> {
    fn label(&self) -> String {
        format!("{}/{}", self.command.module(), self.command.verb())
    }
}

impl<Cmd: ControlCommand> InterestHandler<Face> for CommandHandler<Cmd> {
    fn on_data(self: Box<Self>, face: &mut Face, _interest: &Interest, data: &Data) {
        let this = *self;
        match process_response(&this.command, data) {
            Ok(parameters) => {
                tracing::debug!(
                    command = %this.label(),
                    parameters = %this.parameters,
                    prefix = %this.prefix,
                    body = %parameters,
                    "command succeeded"
                );
                (this.on_success)(face, parameters);
            }
            Err(error) => {
                tracing::warn!(
                    command = %this.label(),
                    parameters = %this.parameters,
                    prefix = %this.prefix,
                    code = error.code(),
                    %error,
                    "command failed"
                );
                (this.on_failure)(face, error);
            }
        }
    }

    fn on_nack(self: Box<Self>, face: &mut Face, _interest: &Interest, nack: &Nack) {
        tracing::warn!(
            command = %self.label(),
            parameters = %self.parameters,
            prefix = %self.prefix,
            reason = %nack.reason,
            "command nacked"
        );
        (self.on_failure)(face, CommandError::NetworkNack(nack.reason));
    }

    fn on_timeout(self: Box<Self>, face: &mut Face, _interest: &Interest) {
        tracing::warn!(
            command = %self.label(),
            parameters = %self.parameters,
            prefix = %self.prefix,
            "command timed out"
        );
        (self.on_failure)(face, CommandError::Timeout);
    }
}

impl Face {
    /// Sign and express a management command. Exactly one of `on_success`
    /// and `on_failure` runs later; invalid parameters fail here instead.
    pub fn start_command<Cmd>(
        &mut self,
        command: Cmd,
        parameters: ControlParameters,
        on_success: impl FnOnce(&mut Face, ControlParameters) + 'static,
        on_failure: impl FnOnce(&mut Face, CommandError) + 'static,
        options: &CommandOptions,
    ) -> Result<PendingInterestId, FaceError>
    where
        Cmd: ControlCommand + 'static,
    {
        let name = command.request_name(&options.prefix, &parameters)?;
        let name = self.sign_command(name, &options.signing)?;
        let interest = Interest::new(name).with_lifetime(options.timeout);
        let handler = CommandHandler {
            command,
            parameters,
            prefix: options.prefix.clone(),
            on_success: Box::new(on_success),
            on_failure: Box::new(on_failure),
        };
        tracing::debug!(
            command = %handler.label(),
            parameters = %handler.parameters,
            prefix = %handler.prefix,
            signed_by = ?options.signing,
            "command request"
        );
        self.express_interest(interest, handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::face::RunMode;
    use crate::mgmt::StandardCommand;
    use crate::signer::SignerError;
    use crate::tlv::types;
    use crate::transport::{ChannelTransport, Transport};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn reply(content: Vec<u8>) -> Data {
        Data::new("/localhost/nfd/rib/register".parse().unwrap()).with_content(content)
    }

    fn register_body() -> ControlParameters {
        ControlParameters::new()
            .with_name("/app".parse().unwrap())
            .with_face_id(7)
            .with_origin(0)
            .with_cost(0)
            .with_flags(1)
    }

    #[test]
    fn success_returns_body() {
        let response = ControlResponse::new(200, "OK").with_body(register_body().to_element());
        let result = process_response(&StandardCommand::RibRegister, &reply(response.encode()));
        assert_eq!(result, Ok(register_body()));
    }

    #[test]
    fn status_at_lower_bound_fails_with_forwarder_code() {
        let response = ControlResponse::new(404, "not found");
        let err = process_response(&StandardCommand::RibRegister, &reply(response.encode()))
            .unwrap_err();
        assert_eq!(
            err,
            CommandError::Application {
                code: 404,
                text: "not found".into()
            }
        );
        assert_eq!(err.code(), 404);
        assert_eq!(err.text(), "not found");
    }

    #[test]
    fn unparsable_body_is_server_error() {
        let garbage = Element::new(types::CONTROL_PARAMETERS, vec![0xFF]);
        let response = ControlResponse::new(200, "OK").with_body(garbage);
        let err = process_response(&StandardCommand::RibRegister, &reply(response.encode()))
            .unwrap_err();
        assert_eq!(err.code(), ERROR_SERVER);
        assert!(matches!(err, CommandError::Server(_)));
    }

    #[test]
    fn invalid_body_is_server_error() {
        let body = register_body().with_face_id(0).to_element();
        let response = ControlResponse::new(200, "OK").with_body(body);
        let err = process_response(&StandardCommand::RibRegister, &reply(response.encode()))
            .unwrap_err();
        assert_eq!(err, CommandError::Server("FaceId must not be zero".into()));
    }

    #[test]
    fn unparsable_envelope_is_server_error() {
        let err = process_response(&StandardCommand::RibRegister, &reply(vec![1, 2]))
            .unwrap_err();
        assert_eq!(err.code(), ERROR_SERVER);
    }

    #[test]
    fn fixed_failure_codes() {
        assert_eq!(CommandError::Timeout.code(), 10060);
        assert_eq!(CommandError::Timeout.text(), "request timed out");
        assert_eq!(CommandError::NetworkNack(NackReason::NoRoute).code(), 10800);
        assert_eq!(
            CommandError::NetworkNack(NackReason::NoRoute).text(),
            "network Nack received"
        );
    }

    type Outcome = Rc<RefCell<Option<Result<ControlParameters, (u32, String)>>>>;

    fn start_register(
        face: &mut Face,
        options: &CommandOptions,
    ) -> (Result<PendingInterestId, FaceError>, Outcome) {
        let outcome: Outcome = Rc::default();
        let (ok, failed) = (outcome.clone(), outcome.clone());
        let started = face.start_command(
            StandardCommand::RibRegister,
            ControlParameters::new().with_name("/app".parse().unwrap()),
            move |_, parameters| *ok.borrow_mut() = Some(Ok(parameters)),
            move |_, error| *failed.borrow_mut() = Some(Err((error.code(), error.text()))),
            options,
        );
        (started, outcome)
    }

    fn sent_interest(forwarder: &mut ChannelTransport) -> Interest {
        let wire = forwarder
            .recv_timeout(Some(Duration::ZERO))
            .unwrap()
            .expect("command interest sent");
        Interest::decode(&wire).unwrap()
    }

    #[test]
    fn nacked_command_fails_with_nack_code() {
        let (local, mut forwarder) = ChannelTransport::pair();
        let mut face = Face::new(local);
        let (started, outcome) = start_register(&mut face, &CommandOptions::default());
        started.unwrap();

        let command = sent_interest(&mut forwarder);
        forwarder
            .send(&Nack::new(command, NackReason::NoRoute).encode())
            .unwrap();
        face.process_events(RunMode::Poll).unwrap();
        assert_eq!(
            *outcome.borrow(),
            Some(Err((ERROR_NACK, "network Nack received".to_owned())))
        );
    }

    #[test]
    fn options_set_prefix_and_timeout() {
        let (local, mut forwarder) = ChannelTransport::pair();
        let clock = Rc::new(ManualClock::new());
        let mut face = Face::builder(local).clock(clock.clone()).build();
        let options = CommandOptions::default()
            .with_prefix("/localhop/nfd".parse().unwrap())
            .with_timeout(Duration::from_millis(500));
        assert_eq!(options.signing, SigningInfo::Digest);
        let (started, outcome) = start_register(&mut face, &options);
        started.unwrap();

        let command = sent_interest(&mut forwarder);
        assert!("/localhop/nfd/rib/register"
            .parse::<Name>()
            .unwrap()
            .is_prefix_of(&command.name));
        assert_eq!(command.lifetime, Some(Duration::from_millis(500)));

        clock.advance(Duration::from_millis(499));
        face.process_events(RunMode::Poll).unwrap();
        assert!(outcome.borrow().is_none());
        clock.advance(Duration::from_millis(1));
        face.process_events(RunMode::Poll).unwrap();
        assert_eq!(
            *outcome.borrow(),
            Some(Err((ERROR_TIMEOUT, "request timed out".to_owned())))
        );
    }

    #[test]
    fn identity_signing_is_rejected_before_sending() {
        let (local, mut forwarder) = ChannelTransport::pair();
        let mut face = Face::new(local);
        let identity: Name = "/me".parse().unwrap();
        let options = CommandOptions::default().with_signing(SigningInfo::Identity(identity.clone()));
        let (started, outcome) = start_register(&mut face, &options);
        assert!(matches!(
            started,
            Err(FaceError::Signer(SignerError::UnknownIdentity(n))) if n == identity
        ));
        assert!(outcome.borrow().is_none());
        assert_eq!(forwarder.recv_timeout(Some(Duration::ZERO)).unwrap(), None);
    }
}

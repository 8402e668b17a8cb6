//! Management command descriptors: module/verb plus request and response field rules.

use std::fmt;

use super::parameters::{
    ControlParameters, Field, ALL_FIELDS, ROUTE_FLAG_CHILD_INHERIT, ROUTE_ORIGIN_APP,
};
use crate::name::{Component, Name};

/// Parameters do not fit a command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    #[error("{0} is required but missing")]
    Missing(Field),
    #[error("{0} is forbidden but present")]
    Forbidden(Field),
    #[error("{0}")]
    Invalid(&'static str),
}

/// Required and optional fields; everything else is forbidden.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub required: &'static [Field],
    pub optional: &'static [Field],
}

impl FieldSpec {
    pub fn check(&self, params: &ControlParameters) -> Result<(), ArgumentError> {
        for &field in ALL_FIELDS.iter() {
            let present = params.has(field);
            if self.required.contains(&field) {
                if !present {
                    return Err(ArgumentError::Missing(field));
                }
            } else if present && !self.optional.contains(&field) {
                return Err(ArgumentError::Forbidden(field));
            }
        }
        Ok(())
    }
}

pub trait ControlCommand {
    fn module(&self) -> &'static str;
    fn verb(&self) -> &'static str;
    fn request_fields(&self) -> FieldSpec;
    fn response_fields(&self) -> FieldSpec;

    /// Fill in omitted optional request fields.
    fn apply_defaults(&self, _params: &mut ControlParameters) {}

    fn validate_request(&self, params: &ControlParameters) -> Result<(), ArgumentError> {
        self.request_fields().check(params)
    }

    fn validate_response(&self, params: &ControlParameters) -> Result<(), ArgumentError> {
        self.response_fields().check(params)
    }

    /// `prefix/module/verb/<ControlParameters>`, after defaults and validation.
    /// The result still has to be signed.
    fn request_name(&self, prefix: &Name, params: &ControlParameters) -> Result<Name, ArgumentError> {
        let mut params = params.clone();
        self.apply_defaults(&mut params);
        self.validate_request(&params)?;
        Ok(prefix
            .append(self.module())
            .append(self.verb())
            .append(Component::new(params.encode())))
    }
}

/// Commands understood by the local forwarder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardCommand {
    FaceCreate,
    FaceDestroy,
    FibAddNextHop,
    FibRemoveNextHop,
    StrategyChoiceSet,
    StrategyChoiceUnset,
    RibRegister,
    RibUnregister,
}

const fn spec(required: &'static [Field], optional: &'static [Field]) -> FieldSpec {
    FieldSpec { required, optional }
}

impl ControlCommand for StandardCommand {
    fn module(&self) -> &'static str {
        match self {
            StandardCommand::FaceCreate | StandardCommand::FaceDestroy => "faces",
            StandardCommand::FibAddNextHop | StandardCommand::FibRemoveNextHop => "fib",
            StandardCommand::StrategyChoiceSet | StandardCommand::StrategyChoiceUnset => {
                "strategy-choice"
            }
            StandardCommand::RibRegister | StandardCommand::RibUnregister => "rib",
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            StandardCommand::FaceCreate => "create",
            StandardCommand::FaceDestroy => "destroy",
            StandardCommand::FibAddNextHop => "add-nexthop",
            StandardCommand::FibRemoveNextHop => "remove-nexthop",
            StandardCommand::StrategyChoiceSet => "set",
            StandardCommand::StrategyChoiceUnset => "unset",
            StandardCommand::RibRegister => "register",
            StandardCommand::RibUnregister => "unregister",
        }
    }

    fn request_fields(&self) -> FieldSpec {
        match self {
            StandardCommand::FaceCreate => spec(&[Field::Uri], &[]),
            StandardCommand::FaceDestroy => spec(&[Field::FaceId], &[]),
            StandardCommand::FibAddNextHop => {
                spec(&[Field::Name], &[Field::FaceId, Field::Cost])
            }
            StandardCommand::FibRemoveNextHop => spec(&[Field::Name], &[Field::FaceId]),
            StandardCommand::StrategyChoiceSet => spec(&[Field::Name, Field::Strategy], &[]),
            StandardCommand::StrategyChoiceUnset => spec(&[Field::Name], &[]),
            StandardCommand::RibRegister => {
                const OPTIONAL: &[Field] = &[
                    Field::FaceId,
                    Field::Origin,
                    Field::Cost,
                    Field::Flags,
                    Field::ExpirationPeriod,
                ];
                spec(&[Field::Name], OPTIONAL)
            }
            StandardCommand::RibUnregister => {
                spec(&[Field::Name], &[Field::FaceId, Field::Origin])
            }
        }
    }

    fn response_fields(&self) -> FieldSpec {
        match self {
            StandardCommand::FaceCreate => spec(&[Field::FaceId, Field::Uri], &[]),
            StandardCommand::FaceDestroy => spec(&[Field::FaceId], &[]),
            StandardCommand::FibAddNextHop => {
                spec(&[Field::Name, Field::FaceId, Field::Cost], &[])
            }
            StandardCommand::FibRemoveNextHop => spec(&[Field::Name, Field::FaceId], &[]),
            StandardCommand::StrategyChoiceSet => spec(&[Field::Name, Field::Strategy], &[]),
            StandardCommand::StrategyChoiceUnset => spec(&[Field::Name], &[]),
            StandardCommand::RibRegister => {
                const REQUIRED: &[Field] = &[
                    Field::Name,
                    Field::FaceId,
                    Field::Origin,
                    Field::Cost,
                    Field::Flags,
                ];
                spec(REQUIRED, &[Field::ExpirationPeriod])
            }
            StandardCommand::RibUnregister => {
                spec(&[Field::Name, Field::FaceId, Field::Origin], &[])
            }
        }
    }

    fn apply_defaults(&self, params: &mut ControlParameters) {
        match self {
            StandardCommand::FibAddNextHop => {
                params.face_id.get_or_insert(0);
                params.cost.get_or_insert(0);
            }
            StandardCommand::FibRemoveNextHop => {
                params.face_id.get_or_insert(0);
            }
            StandardCommand::RibRegister => {
                params.face_id.get_or_insert(0);
                params.origin.get_or_insert(ROUTE_ORIGIN_APP);
                params.cost.get_or_insert(0);
                params.flags.get_or_insert(ROUTE_FLAG_CHILD_INHERIT);
            }
            StandardCommand::RibUnregister => {
                params.face_id.get_or_insert(0);
                params.origin.get_or_insert(ROUTE_ORIGIN_APP);
            }
            _ => {}
        }
    }

    fn validate_request(&self, params: &ControlParameters) -> Result<(), ArgumentError> {
        self.request_fields().check(params)?;
        if *self == StandardCommand::StrategyChoiceUnset
            && params.name.as_ref().is_some_and(|name| name.is_empty())
        {
            return Err(ArgumentError::Invalid("strategy cannot be unset for the root prefix"));
        }
        Ok(())
    }

    fn validate_response(&self, params: &ControlParameters) -> Result<(), ArgumentError> {
        self.response_fields().check(params)?;
        // The forwarder must resolve face 0 ("the requesting face") to a real id.
        let resolves_face = !matches!(
            self,
            StandardCommand::StrategyChoiceSet | StandardCommand::StrategyChoiceUnset
        );
        if resolves_face && params.face_id == Some(0) {
            return Err(ArgumentError::Invalid("FaceId must not be zero"));
        }
        Ok(())
    }
}

impl fmt::Display for StandardCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.module(), self.verb())
    }
}

//! Argument binder.
//!
//! Maps everything after the matched command path onto the command's
//! declared options and parameters, coercing each argument to its type.

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;

use super::match_prefix;
use crate::command::{CommandSpec, OptionKind, OptionSpec, ParamSpec, ParamType, Token, TokenKind, Value, tokenize};
use crate::error::BindError;
use crate::event::{BotEvent, Segment};

/// Arguments bound for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BindResult {
    /// One value per declared parameter, in declaration order. Absent
    /// optional parameters without a default are `Value::Null`.
    pub positional: Vec<Value>,
    pub named: BTreeMap<String, Value>,
}

/// A raw argument: a token from text, or a non-text segment.
#[derive(Debug, Clone)]
enum Arg {
    Token(Token),
    Mention(u64),
}

impl Arg {
    fn display(&self) -> String {
        match self {
            Self::Token(token) => token.value.clone(),
            Self::Mention(id) => format!("@{id}"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArgumentBinder {
    case_sensitive: bool,
}

impl ArgumentBinder {
    pub fn new(case_sensitive: bool) -> Self {
        Self { case_sensitive }
    }

    /// Bind `event`'s arguments for `spec`.
    ///
    /// `ignore_words` is the number of leading tokens that matched the
    /// command path; `allowed_prefixes` are stripped from the first segment
    /// before tokenizing.
    pub fn bind(
        &self,
        spec: &CommandSpec,
        event: &dyn BotEvent,
        ignore_words: usize,
        allowed_prefixes: &[String],
    ) -> Result<BindResult, BindError> {
        let args = self.collect_args(event, ignore_words, allowed_prefixes);
        let (positional, mut named) = split_options(spec, args)?;

        for option in &spec.options {
            if named.contains_key(&option.name) {
                continue;
            }
            match (&option.default, &option.kind) {
                (Some(default), _) => {
                    named.insert(option.name.clone(), default.clone());
                }
                (None, OptionKind::Flag) => {
                    named.insert(option.name.clone(), Value::Bool(false));
                }
                (None, OptionKind::Value(_)) => {}
            }
        }

        let positional = bind_params(&spec.params, positional)?;
        Ok(BindResult { positional, named })
    }

    fn collect_args(&self, event: &dyn BotEvent, ignore_words: usize, allowed_prefixes: &[String]) -> Vec<Arg> {
        let segments = event.segments();
        let mut args = Vec::new();
        let mut rest = segments;

        if let Some(Segment::Text(first)) = segments.first() {
            let text = first.trim_start();
            let start = match_prefix(text, allowed_prefixes, self.case_sensitive).map_or(0, |(len, _)| len);
            args.extend(
                tokenize(&text[start..])
                    .into_iter()
                    .skip(ignore_words)
                    .map(Arg::Token),
            );
            rest = &segments[1..];
        }

        for segment in rest {
            match segment {
                Segment::Text(text) => args.extend(tokenize(text).into_iter().map(Arg::Token)),
                Segment::Mention(id) => args.push(Arg::Mention(*id)),
                Segment::Other(_) => {}
            }
        }

        args
    }
}

/// Pull options out of the argument stream, leaving positionals in order.
fn split_options(spec: &CommandSpec, args: Vec<Arg>) -> Result<(VecDeque<Arg>, BTreeMap<String, Value>), BindError> {
    let mut positional = VecDeque::new();
    let mut named = BTreeMap::new();
    let mut iter = args.into_iter().peekable();

    while let Some(arg) = iter.next() {
        let token = match arg {
            Arg::Token(token) if matches!(token.kind, TokenKind::OptionName | TokenKind::Flag) => token,
            other => {
                positional.push_back(other);
                continue;
            }
        };

        if token.kind == TokenKind::OptionName {
            let option = spec
                .find_option(&token.value)
                .ok_or_else(|| BindError::UnknownOption {
                    option: format!("--{}", token.value),
                })?;
            let value = option_value(option, &format!("--{}", option.name), &mut iter)?;
            named.insert(option.name.clone(), value);
            continue;
        }

        let shorts: Vec<char> = token.value.chars().collect();
        for (i, short) in shorts.iter().enumerate() {
            let option = spec
                .find_short_option(*short)
                .ok_or_else(|| BindError::UnknownOption {
                    option: format!("-{short}"),
                })?;
            // Only the last flag of a group like `-abc` may take a value
            if option.takes_value() && i + 1 != shorts.len() {
                return Err(BindError::MissingOptionValue {
                    option: format!("-{short}"),
                });
            }
            let value = option_value(option, &format!("-{short}"), &mut iter)?;
            named.insert(option.name.clone(), value);
        }
    }

    Ok((positional, named))
}

fn option_value(
    option: &OptionSpec,
    display: &str,
    iter: &mut std::iter::Peekable<std::vec::IntoIter<Arg>>,
) -> Result<Value, BindError> {
    match &option.kind {
        OptionKind::Flag => Ok(Value::Bool(true)),
        OptionKind::Value(ty) => {
            let is_value = matches!(iter.peek(), Some(Arg::Mention(_)))
                || matches!(iter.peek(), Some(Arg::Token(t)) if t.is_text());
            if !is_value {
                return Err(BindError::MissingOptionValue {
                    option: display.to_string(),
                });
            }
            match iter.next() {
                Some(arg) => coerce(&arg, ty, &option.name),
                None => Err(BindError::MissingOptionValue {
                    option: display.to_string(),
                }),
            }
        }
    }
}

/// Fill declared parameters from positional arguments.
fn bind_params(params: &[ParamSpec], mut args: VecDeque<Arg>) -> Result<Vec<Value>, BindError> {
    let mut values = Vec::with_capacity(params.len());

    for param in params {
        if args.is_empty() {
            values.push(missing(param)?);
            continue;
        }

        let value = match &param.ty {
            ParamType::Rest => {
                let words: Vec<String> = args.drain(..).map(|arg| arg.display()).collect();
                Value::Str(words.join(" "))
            }
            ParamType::List(inner) => {
                let items = args
                    .drain(..)
                    .map(|arg| coerce(&arg, inner, &param.name))
                    .collect::<Result<Vec<_>, _>>()?;
                Value::List(items)
            }
            ParamType::Record(fields) => {
                let mut record = BTreeMap::new();
                for (field, ty) in fields {
                    let name = format!("{}.{}", param.name, field);
                    let arg = args.pop_front().ok_or(BindError::MissingArgument { name: name.clone() })?;
                    record.insert(field.clone(), coerce(&arg, ty, &name)?);
                }
                Value::Record(record)
            }
            ty => match args.pop_front() {
                Some(arg) => coerce(&arg, ty, &param.name)?,
                None => missing(param)?,
            },
        };
        values.push(value);
    }

    if let Some(extra) = args.front() {
        return Err(BindError::TooManyArguments { found: extra.display() });
    }

    Ok(values)
}

fn missing(param: &ParamSpec) -> Result<Value, BindError> {
    match &param.default {
        Some(default) => Ok(default.clone()),
        None if param.required => Err(BindError::MissingArgument {
            name: param.name.clone(),
        }),
        None => Ok(Value::Null),
    }
}

/// Coerce one argument to a scalar type.
fn coerce(arg: &Arg, ty: &ParamType, name: &str) -> Result<Value, BindError> {
    let mismatch = || BindError::TypeMismatch {
        name: name.to_string(),
        expected: ty.label(),
        found: arg.display(),
    };

    let token = match arg {
        Arg::Mention(id) => {
            return match ty {
                ParamType::Mention => Ok(Value::Mention(*id)),
                _ => Err(mismatch()),
            };
        }
        Arg::Token(token) => token,
    };
    let text = token.value.as_str();

    match ty {
        ParamType::Str | ParamType::Rest => Ok(Value::Str(text.to_string())),
        ParamType::Int => text.parse::<i64>().map(Value::Int).map_err(|_| mismatch()),
        ParamType::Float => match text.parse::<f64>() {
            Ok(x) if x.is_finite() => Ok(Value::Float(x)),
            _ => Err(mismatch()),
        },
        ParamType::Bool => parse_bool(text).map(Value::Bool).ok_or_else(mismatch),
        ParamType::Choice(options) => options
            .iter()
            .find(|option| option.eq_ignore_ascii_case(text))
            .map(|option| Value::Str(option.clone()))
            .ok_or_else(mismatch),
        ParamType::Mention => text
            .strip_prefix('@')
            .and_then(|id| id.parse::<u64>().ok())
            .map(Value::Mention)
            .ok_or_else(mismatch),
        ParamType::List(_) | ParamType::Record(_) => Err(mismatch()),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Handler;
    use crate::testing::TestEvent;

    fn spec(path: &str) -> CommandSpec {
        CommandSpec::new(path, Handler::from_fn(|_| Ok(())))
    }

    fn bind_text(spec: &CommandSpec, text: &str) -> Result<BindResult, BindError> {
        let ignore = spec.path_words.len();
        ArgumentBinder::new(false).bind(spec, &TestEvent::private(text), ignore, &["/".to_string()])
    }

    #[test]
    fn test_int_binding() {
        let ban = spec("ban").param(ParamSpec::required("user_id", ParamType::Int));

        let bound = bind_text(&ban, "/ban 42").unwrap();
        assert_eq!(bound.positional, vec![Value::Int(42)]);

        let err = bind_text(&ban, "/ban abc").unwrap_err();
        assert_eq!(
            err,
            BindError::TypeMismatch {
                name: "user_id".into(),
                expected: "an integer".into(),
                found: "abc".into(),
            }
        );
        assert_eq!(err.to_string(), "argument `user_id` expects an integer, got `abc`");
    }

    #[test]
    fn test_missing_required_and_defaults() {
        let list = spec("user list")
            .param(ParamSpec::required("group", ParamType::Str))
            .param(ParamSpec::optional("page", ParamType::Int).default(1i64))
            .param(ParamSpec::optional("filter", ParamType::Str));

        let err = bind_text(&list, "/user list").unwrap_err();
        assert_eq!(err, BindError::MissingArgument { name: "group".into() });

        let bound = bind_text(&list, "/user list staff").unwrap();
        assert_eq!(bound.positional, vec![Value::Str("staff".into()), Value::Int(1), Value::Null]);

        let bound = bind_text(&list, "/USER LIST staff 3 active").unwrap();
        assert_eq!(
            bound.positional,
            vec![Value::Str("staff".into()), Value::Int(3), Value::Str("active".into())]
        );
    }

    #[test]
    fn test_required_with_default_uses_default() {
        let cmd = spec("mute")
            .param(ParamSpec::required("user_id", ParamType::Int))
            .param(ParamSpec::required("seconds", ParamType::Int).default(300i64));

        let bound = bind_text(&cmd, "/mute 7").unwrap();
        assert_eq!(bound.positional, vec![Value::Int(7), Value::Int(300)]);
    }

    #[test]
    fn test_scalar_coercions() {
        let cmd = spec("set")
            .param(ParamSpec::required("enabled", ParamType::Bool))
            .param(ParamSpec::required("ratio", ParamType::Float))
            .param(ParamSpec::required(
                "level",
                ParamType::Choice(vec!["low".into(), "high".into()]),
            ))
            .param(ParamSpec::required("offset", ParamType::Int));

        let bound = bind_text(&cmd, "/set YES 0.5 HIGH -3").unwrap();
        assert_eq!(
            bound.positional,
            vec![
                Value::Bool(true),
                Value::Float(0.5),
                Value::Str("high".into()),
                Value::Int(-3),
            ]
        );

        assert!(bind_text(&cmd, "/set maybe 0.5 low 1").is_err());
        assert!(bind_text(&cmd, "/set no nan low 1").is_err());
        assert!(bind_text(&cmd, "/set 0 1 medium 1").is_err());
    }

    #[test]
    fn test_quoted_and_rest() {
        let say = spec("say")
            .param(ParamSpec::required("target", ParamType::Str))
            .param(ParamSpec::required("text", ParamType::Rest));

        let bound = bind_text(&say, r#"/say "general chat" hello   big world"#).unwrap();
        assert_eq!(
            bound.positional,
            vec![Value::Str("general chat".into()), Value::Str("hello big world".into())]
        );
    }

    #[test]
    fn test_too_many_arguments() {
        let ping = spec("ping");
        let err = bind_text(&ping, "/ping extra").unwrap_err();
        assert_eq!(err, BindError::TooManyArguments { found: "extra".into() });
    }

    #[test]
    fn test_options_and_flags() {
        let deploy = spec("deploy")
            .param(ParamSpec::required("service", ParamType::Str))
            .option(OptionSpec::flag("force").short('f'))
            .option(OptionSpec::flag("verbose").short('v'))
            .option(OptionSpec::value("env", ParamType::Str).short('e').default("staging"))
            .option(OptionSpec::value("replicas", ParamType::Int));

        let bound = bind_text(&deploy, "/deploy api --env=prod -fv").unwrap();
        assert_eq!(bound.positional, vec![Value::Str("api".into())]);
        assert_eq!(bound.named["env"], Value::Str("prod".into()));
        assert_eq!(bound.named["force"], Value::Bool(true));
        assert_eq!(bound.named["verbose"], Value::Bool(true));
        assert!(!bound.named.contains_key("replicas"));

        let bound = bind_text(&deploy, "/deploy --replicas 3 -e dev api").unwrap();
        assert_eq!(bound.named["replicas"], Value::Int(3));
        assert_eq!(bound.named["env"], Value::Str("dev".into()));
        assert_eq!(bound.named["force"], Value::Bool(false));
        assert_eq!(bound.positional, vec![Value::Str("api".into())]);

        let bound = bind_text(&deploy, "/deploy api").unwrap();
        assert_eq!(bound.named["env"], Value::Str("staging".into()));
    }

    #[test]
    fn test_option_errors() {
        let deploy = spec("deploy")
            .option(OptionSpec::flag("force").short('f'))
            .option(OptionSpec::value("env", ParamType::Str).short('e'))
            .option(OptionSpec::value("replicas", ParamType::Int));

        assert_eq!(
            bind_text(&deploy, "/deploy --nope").unwrap_err(),
            BindError::UnknownOption { option: "--nope".into() }
        );
        assert_eq!(
            bind_text(&deploy, "/deploy -x").unwrap_err(),
            BindError::UnknownOption { option: "-x".into() }
        );
        assert_eq!(
            bind_text(&deploy, "/deploy --env").unwrap_err(),
            BindError::MissingOptionValue { option: "--env".into() }
        );
        assert_eq!(
            bind_text(&deploy, "/deploy -ef prod").unwrap_err(),
            BindError::MissingOptionValue { option: "-e".into() }
        );
        assert!(matches!(
            bind_text(&deploy, "/deploy --replicas many").unwrap_err(),
            BindError::TypeMismatch { .. }
        ));
    }

    #[test]
    fn test_list_and_record() {
        let tag = spec("tag").param(ParamSpec::required("ids", ParamType::List(Box::new(ParamType::Int))));
        let bound = bind_text(&tag, "/tag 1 2 3").unwrap();
        assert_eq!(
            bound.positional,
            vec![Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])]
        );
        assert!(bind_text(&tag, "/tag 1 x").is_err());
        assert!(matches!(bind_text(&tag, "/tag").unwrap_err(), BindError::MissingArgument { .. }));

        let point = spec("goto").param(ParamSpec::required(
            "pos",
            ParamType::Record(vec![("x".into(), ParamType::Int), ("y".into(), ParamType::Int)]),
        ));
        let bound = bind_text(&point, "/goto 3 -4").unwrap();
        let record = bound.positional[0].as_record().unwrap();
        assert_eq!(record["x"], Value::Int(3));
        assert_eq!(record["y"], Value::Int(-4));

        assert_eq!(
            bind_text(&point, "/goto 3").unwrap_err(),
            BindError::MissingArgument { name: "pos.y".into() }
        );
    }

    #[test]
    fn test_mentions_from_segments_and_words() {
        let kick = spec("kick").param(ParamSpec::required("target", ParamType::Mention));
        let event = TestEvent::group("").with_segments(vec![
            Segment::Text("/kick ".into()),
            Segment::Mention(99),
        ]);

        let bound = ArgumentBinder::new(false)
            .bind(&kick, &event, 1, &["/".to_string()])
            .unwrap();
        assert_eq!(bound.positional, vec![Value::Mention(99)]);

        let bound = bind_text(&kick, "/kick @123").unwrap();
        assert_eq!(bound.positional, vec![Value::Mention(123)]);
        assert!(bind_text(&kick, "/kick bob").is_err());
    }

    #[test]
    fn test_prefixless_binding() {
        let ping = spec("echo").param(ParamSpec::required("text", ParamType::Rest));
        let bound = ArgumentBinder::new(false)
            .bind(&ping, &TestEvent::private("echo hi there"), 1, &[String::new()])
            .unwrap();
        assert_eq!(bound.positional, vec![Value::Str("hi there".into())]);
    }
}

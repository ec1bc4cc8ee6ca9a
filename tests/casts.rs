//! End-to-end casting tests: lookup, defaulting, proxying, schema
//! precedence, and the preprocess/cast/postprocess pipeline.

use std::collections::BTreeMap;

use envcast::testing::EnvGuard;
use envcast::{Cast, Env, EnvError, Schema, Value, VarSpec};
use serde_json::json;

/// Variables mirroring a realistic service environment.
const SAMPLE_VARS: &[(&str, &str)] = &[
    ("BLANK", ""),
    ("STR", "foo"),
    ("INT", "42"),
    ("FLOAT", "33.3"),
    ("BOOL_TRUE", "1"),
    ("BOOL_FALSE", "0"),
    ("PROXIED", "{{STR}}"),
    ("PROXY_INT", "{{INT}}"),
    ("LIST_STR", "foo,bar"),
    ("LIST_STR_WITH_SPACES", " foo,  bar"),
    ("LIST_INT", "1,2,3"),
    ("LIST_INT_WITH_SPACES", " 1,  2,3"),
    ("LIST_DUPES", "foo,bar,foo"),
    ("DICT_STR", "key1=val1, key2=val2"),
    ("DICT_INT", "key1=1, key2=2"),
    ("JSON", r#"{"foo": "bar", "baz": [1, 2, 3]}"#),
    ("URL", "https://example.com/path?query=1"),
];

fn with_sample_env(check: impl FnOnce(&Env)) {
    let _guard = EnvGuard::with_vars(SAMPLE_VARS);
    check(&Env::new());
}

fn str_values(items: &[&str]) -> Vec<Value> {
    items.iter().map(|s| Value::from(*s)).collect()
}

fn int_values(items: &[i64]) -> Vec<Value> {
    items.iter().copied().map(Value::from).collect()
}

fn sample_schema() -> Schema {
    Schema::new()
        .declare("STR", Cast::Str)
        .declare(
            "STR_DEFAULT",
            VarSpec::from(Cast::Str).with_default("default"),
        )
        .declare("INT", Cast::Int)
        .declare("LIST_STR", Cast::List)
        .declare(
            "LIST_INT",
            VarSpec::from(Cast::List).with_subcast(Cast::Int),
        )
}

#[test]
fn test_missing_variable_fails() {
    let mut guard = EnvGuard::lock();
    guard.remove("NOT_PRESENT");
    let err = Env::new()
        .resolve("NOT_PRESENT", VarSpec::new())
        .unwrap_err();
    assert!(matches!(err, EnvError::NotSet { .. }));
    assert_eq!(
        err.to_string(),
        "Environment variable 'NOT_PRESENT' is not set"
    );
}

#[test]
fn test_missing_variable_with_default() {
    let mut guard = EnvGuard::lock();
    guard.remove("NOT_PRESENT");
    let resolved = Env::new()
        .resolve("NOT_PRESENT", VarSpec::new().with_default("default val"))
        .unwrap();
    assert_eq!(resolved, Value::from("default val"));
}

#[test]
fn test_null_default() {
    let mut guard = EnvGuard::lock();
    guard.remove("OPTIONAL_FLAG");
    let resolved = Env::new()
        .resolve("OPTIONAL_FLAG", VarSpec::new().with_default(Value::Null))
        .unwrap();
    assert!(resolved.is_null());
}

#[test]
fn test_unknown_named_cast() {
    let err = Env::new()
        .cast_named("teapot", "STR", VarSpec::new())
        .unwrap_err();
    match err {
        EnvError::UnknownCast { kind } => assert_eq!(kind, "teapot"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_string() {
    with_sample_env(|env| {
        assert_eq!(env.string("STR").unwrap(), "foo");
        assert_eq!(env.string("BLANK").unwrap(), "");
    });
}

#[test]
fn test_int() {
    with_sample_env(|env| {
        assert_eq!(env.int("INT").unwrap(), 42);
    });
}

#[test]
fn test_float() {
    with_sample_env(|env| {
        assert_eq!(env.float("FLOAT").unwrap(), 33.3);
    });
}

#[test]
fn test_bool() {
    with_sample_env(|env| {
        assert!(env.bool("BOOL_TRUE").unwrap());
        assert!(!env.bool("BOOL_FALSE").unwrap());
        assert!(!env.bool("BLANK").unwrap());
    });
}

#[test]
fn test_cast_failure_names_variable() {
    let _guard = EnvGuard::with_vars(&[("NOT_A_NUMBER", "abc")]);
    let err = Env::new().int("NOT_A_NUMBER").unwrap_err();
    match err {
        EnvError::Cast { var, message } => {
            assert_eq!(var, "NOT_A_NUMBER");
            assert!(message.contains("abc"), "message: {message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_proxied_value() {
    with_sample_env(|env| {
        assert_eq!(env.string("PROXIED").unwrap(), "foo");
    });
}

#[test]
fn test_proxied_value_is_cast() {
    with_sample_env(|env| {
        assert_eq!(env.int("PROXY_INT").unwrap(), 42);
    });
}

#[test]
fn test_proxy_cycle_fails_closed() {
    let _guard = EnvGuard::with_vars(&[
        ("CYCLE_A", "{{CYCLE_B}}"),
        ("CYCLE_B", "{{CYCLE_A}}"),
    ]);
    let err = Env::new()
        .resolve("CYCLE_A", VarSpec::new())
        .unwrap_err();
    assert!(matches!(err, EnvError::ProxyDepth { .. }));
}

#[test]
fn test_list() {
    with_sample_env(|env| {
        assert_eq!(
            env.list("LIST_STR", None).unwrap(),
            str_values(&["foo", "bar"])
        );
        assert_eq!(
            env.list("LIST_STR_WITH_SPACES", None).unwrap(),
            str_values(&["foo", "bar"])
        );
        assert_eq!(env.list("BLANK", None).unwrap(), Vec::<Value>::new());
    });
}

#[test]
fn test_list_with_subcast() {
    with_sample_env(|env| {
        assert_eq!(
            env.list("LIST_INT", Some(Cast::Int)).unwrap(),
            int_values(&[1, 2, 3])
        );
        assert_eq!(
            env.list("LIST_INT_WITH_SPACES", Some(Cast::Int)).unwrap(),
            int_values(&[1, 2, 3])
        );
    });
}

#[test]
fn test_tuple() {
    with_sample_env(|env| {
        assert_eq!(
            env.tuple("LIST_INT", Some(Cast::Int)).unwrap(),
            int_values(&[1, 2, 3])
        );
    });
}

#[test]
fn test_set_dedups() {
    with_sample_env(|env| {
        assert_eq!(
            env.set("LIST_DUPES", None).unwrap(),
            str_values(&["foo", "bar"])
        );
    });
}

#[test]
fn test_dict() {
    with_sample_env(|env| {
        let mut expected = BTreeMap::new();
        expected.insert("key1".to_string(), Value::from("val1"));
        expected.insert("key2".to_string(), Value::from("val2"));
        assert_eq!(env.dict("DICT_STR", None).unwrap(), expected);
        assert_eq!(env.dict("BLANK", None).unwrap(), BTreeMap::new());
    });
}

#[test]
fn test_dict_with_subcast() {
    with_sample_env(|env| {
        let mut expected = BTreeMap::new();
        expected.insert("key1".to_string(), Value::Int(1));
        expected.insert("key2".to_string(), Value::Int(2));
        assert_eq!(env.dict("DICT_INT", Some(Cast::Int)).unwrap(), expected);
    });
}

#[test]
fn test_json() {
    with_sample_env(|env| {
        assert_eq!(
            env.json("JSON").unwrap(),
            json!({"foo": "bar", "baz": [1, 2, 3]})
        );
    });
}

#[test]
fn test_url() {
    with_sample_env(|env| {
        let url = env.url("URL").unwrap();
        assert_eq!(url.as_str(), "https://example.com/path?query=1");
        assert_eq!(url.host_str(), Some("example.com"));
        assert_eq!(url.query(), Some("query=1"));
    });
}

#[test]
fn test_url_shortcut_parses_schema_default() {
    let mut guard = EnvGuard::lock();
    guard.remove("FALLBACK_URL");
    let schema = Schema::new().declare(
        "FALLBACK_URL",
        VarSpec::from(Cast::Url).with_default("https://fallback.example/"),
    );
    let url = Env::with_schema(schema).url("FALLBACK_URL").unwrap();
    assert_eq!(url.host_str(), Some("fallback.example"));
}

#[test]
fn test_preprocessor() {
    with_sample_env(|env| {
        let spec = VarSpec::new().with_preprocessor(|raw| raw.to_uppercase());
        assert_eq!(env.resolve("STR", spec).unwrap(), Value::from("FOO"));
    });
}

#[test]
fn test_postprocessor() {
    with_sample_env(|env| {
        let spec = VarSpec::new().with_postprocessor(|value| match value {
            Value::Str(s) => Value::Str(format!("{s}_suffixed")),
            other => other,
        });
        assert_eq!(
            env.resolve("STR", spec).unwrap(),
            Value::from("foo_suffixed")
        );
    });
}

#[test]
fn test_postprocessor_reshapes_url_into_settings() {
    let _guard = EnvGuard::with_vars(&[("REDIS_URL", "redis://:redispass@127.0.0.1:6379/0")]);
    let spec = VarSpec::from(Cast::Url).with_postprocessor(|value| match value {
        Value::Url(url) => {
            let mut options = BTreeMap::new();
            options.insert(
                "PASSWORD".to_string(),
                Value::from(url.password().unwrap_or_default()),
            );
            let location = format!(
                "{}:{}:{}",
                url.host_str().unwrap_or_default(),
                url.port().map(|p| p.to_string()).unwrap_or_default(),
                url.path().trim_matches('/'),
            );
            let mut cache = BTreeMap::new();
            cache.insert(
                "BACKEND".to_string(),
                Value::from("django_redis.cache.RedisCache"),
            );
            cache.insert("LOCATION".to_string(), Value::from(location));
            cache.insert("OPTIONS".to_string(), Value::Dict(options));
            Value::Dict(cache)
        }
        other => other,
    });
    let resolved = Env::new().resolve("REDIS_URL", spec).unwrap();
    let entries = resolved.as_dict().expect("postprocessor returns a dict");
    assert_eq!(
        entries["BACKEND"],
        Value::from("django_redis.cache.RedisCache")
    );
    assert_eq!(entries["LOCATION"], Value::from("127.0.0.1:6379:0"));
    assert_eq!(
        entries["OPTIONS"],
        Value::Dict(BTreeMap::from([(
            "PASSWORD".to_string(),
            Value::from("redispass")
        )]))
    );
}

#[test]
fn test_schema_rules_apply() {
    let mut guard = EnvGuard::with_vars(SAMPLE_VARS);
    guard.remove("STR_DEFAULT");
    let env = Env::with_schema(sample_schema());
    assert_eq!(
        env.resolve("STR", VarSpec::new()).unwrap(),
        Value::from("foo")
    );
    assert_eq!(
        env.resolve("STR_DEFAULT", VarSpec::new()).unwrap(),
        Value::from("default")
    );
    assert_eq!(env.resolve("INT", VarSpec::new()).unwrap(), Value::Int(42));
    assert_eq!(
        env.resolve("LIST_STR", VarSpec::new()).unwrap(),
        Value::List(str_values(&["foo", "bar"]))
    );
    assert_eq!(
        env.resolve("LIST_INT", VarSpec::new()).unwrap(),
        Value::List(int_values(&[1, 2, 3]))
    );
}

#[test]
fn test_call_site_overrides_schema() {
    let mut guard = EnvGuard::with_vars(SAMPLE_VARS);
    guard.remove("STR_DEFAULT");
    let env = Env::with_schema(sample_schema());
    // An explicit cast beats the schema's.
    assert_eq!(
        env.resolve("INT", VarSpec::from(Cast::Str)).unwrap(),
        Value::from("42")
    );
    // An explicit default beats the schema's.
    assert_eq!(
        env.resolve("STR_DEFAULT", VarSpec::new().with_default("manual"))
            .unwrap(),
        Value::from("manual")
    );
}

#[test]
fn test_schema_declared_processors() {
    let _guard = EnvGuard::with_vars(&[("GREETING", "hello")]);
    let schema = Schema::new().declare(
        "GREETING",
        VarSpec::from(Cast::Str)
            .with_preprocessor(|raw| raw.to_uppercase())
            .with_postprocessor(|value| match value {
                Value::Str(s) => Value::Str(format!("{s}!")),
                other => other,
            }),
    );
    let env = Env::with_schema(schema);
    assert_eq!(env.string("GREETING").unwrap(), "HELLO!");
}

#[test]
fn test_default_skipped_by_provenance_not_value() {
    let mut guard = EnvGuard::lock();
    guard.remove("LAZY_LIST");
    let env = Env::new();
    // Absent variable: the default comes back uncast.
    assert_eq!(
        env.resolve("LAZY_LIST", VarSpec::from(Cast::List).with_default("1,2,3"))
            .unwrap(),
        Value::from("1,2,3")
    );
    // Same default with force: the pipeline runs.
    assert_eq!(
        env.resolve(
            "LAZY_LIST",
            VarSpec::from(Cast::List)
                .with_subcast(Cast::Int)
                .with_default("1,2,3")
                .with_force()
        )
        .unwrap(),
        Value::List(int_values(&[1, 2, 3]))
    );
    // Present variable equal to the default is still cast.
    guard.set("LAZY_LIST", "1,2,3");
    assert_eq!(
        env.resolve(
            "LAZY_LIST",
            VarSpec::from(Cast::List)
                .with_subcast(Cast::Int)
                .with_default("1,2,3")
        )
        .unwrap(),
        Value::List(int_values(&[1, 2, 3]))
    );
}

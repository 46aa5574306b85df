use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mockall::mock;
use shipwright_cloud::{
    ArtifactBuilder, BuildError, ControlPlane, ControlPlaneError, EcsControlPlane, FailureClass,
    PublishError, RegistryPublisher, RetryPolicy, Tool, ToolError, ToolExecutor, classify, doctor,
};
use shipwright_core::{ArtifactReference, BuildConfig, Environment, Revision};

mock! {
    Executor {}

    impl ToolExecutor for Executor {
        async fn exec(&self, tool: Tool, args: &[String]) -> Result<String, ToolError>;
        async fn exec_with_stdin(
            &self,
            tool: Tool,
            args: &[String],
            stdin_data: &[u8],
        ) -> Result<String, ToolError>;
    }
}

const REGISTRY: &str = "123456789012.dkr.ecr.eu-west-1.amazonaws.com";

fn failed(tool: Tool, stderr: &str) -> ToolError {
    ToolError::CommandFailed {
        tool,
        args: vec![],
        stdout: String::new(),
        stderr: stderr.to_owned(),
    }
}

fn is(args: &[String], prefix: &[&str]) -> bool {
    args.len() >= prefix.len() && args.iter().zip(prefix).all(|(a, p)| a == p)
}

fn artifact(tag: &str) -> ArtifactReference {
    ArtifactReference::new(REGISTRY, "storefront", tag)
}

fn revision() -> Revision {
    Revision::parse("abc1234").unwrap()
}

// ── Artifact Builder ──

fn builder(mock: MockExecutor, config: &BuildConfig) -> ArtifactBuilder<MockExecutor> {
    ArtifactBuilder::new(
        mock,
        Path::new("/src/storefront"),
        config,
        REGISTRY,
        "storefront",
        "{revision}",
    )
}

#[tokio::test]
async fn build_passes_environment_and_tags_with_revision() {
    let mut mock = MockExecutor::new();
    let captured = Arc::new(Mutex::new(Vec::new()));
    let sink = captured.clone();

    mock.expect_exec()
        .withf(|tool, args| *tool == Tool::Docker && is(args, &["build"]))
        .times(1)
        .returning(move |_, args| {
            *sink.lock().unwrap() = args.to_vec();
            Ok(String::new())
        });

    let config = BuildConfig {
        build_args: HashMap::from([
            ("NODE_VERSION".to_owned(), "20".to_owned()),
            ("BUNDLE_WITHOUT".to_owned(), "development".to_owned()),
        ]),
        ..BuildConfig::default()
    };
    let built = builder(mock, &config)
        .build(&revision(), Environment::Staging)
        .await
        .unwrap();

    assert_eq!(built, artifact("abc1234"));

    let args = captured.lock().unwrap().clone();
    let joined = args.join(" ");
    assert!(joined.contains("--file /src/storefront/Dockerfile"));
    assert!(joined.contains("--build-arg ENVIRONMENT=staging"));
    assert!(joined.contains(
        "--build-arg BUNDLE_WITHOUT=development --build-arg NODE_VERSION=20"
    ));
    assert!(joined.contains(&format!("--tag {REGISTRY}/storefront:abc1234")));
    assert!(joined.contains("org.opencontainers.image.revision=abc1234"));
    assert!(joined.ends_with("/src/storefront/."));
}

#[tokio::test]
async fn build_failure_carries_tool_output() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|tool, args| *tool == Tool::Docker && is(args, &["build"]))
        .returning(|_, _| {
            Err(ToolError::CommandFailed {
                tool: Tool::Docker,
                args: vec![],
                stdout: "Step 4/9 : RUN bundle install".to_owned(),
                stderr: "Gem::Ext::BuildError: ERROR: Failed to build gem native extension."
                    .to_owned(),
            })
        });

    let err = builder(mock, &BuildConfig::default())
        .build(&revision(), Environment::Production)
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::Failed { .. }));
    let diagnostics = err.diagnostics().unwrap();
    assert!(diagnostics.contains("RUN bundle install"));
    assert!(diagnostics.contains("Failed to build gem native extension"));
}

#[tokio::test]
async fn build_tool_missing_is_reported() {
    let mut mock = MockExecutor::new();
    mock.expect_exec().returning(|_, _| {
        Err(ToolError::NotFound {
            tool: Tool::Docker,
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        })
    });

    let err = builder(mock, &BuildConfig::default())
        .build(&revision(), Environment::Development)
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::Tool { .. }));
    assert!(err.diagnostics().is_none());
}

#[test]
fn build_reference_is_deterministic() {
    let b = builder(MockExecutor::new(), &BuildConfig::default());
    assert_eq!(
        b.artifact_for(&revision(), Environment::Staging),
        b.artifact_for(&revision(), Environment::Staging)
    );
}

// ── Registry Publisher ──

/// Credentials and login succeed; describe-images reports the tag missing.
fn expect_login_and_missing_tag(mock: &mut MockExecutor, logins: Arc<AtomicU32>) {
    mock.expect_exec()
        .withf(|tool, args| *tool == Tool::Aws && is(args, &["ecr", "get-login-password"]))
        .returning(move |_, _| {
            logins.fetch_add(1, Ordering::SeqCst);
            Ok("s3cr3t-token\n".to_owned())
        });
    mock.expect_exec_with_stdin()
        .withf(|tool, args, stdin| {
            *tool == Tool::Docker
                && is(args, &["login", "--username", "AWS", "--password-stdin"])
                && stdin == b"s3cr3t-token"
        })
        .returning(|_, _, _| Ok("Login Succeeded\n".to_owned()));
    mock.expect_exec()
        .withf(|tool, args| *tool == Tool::Aws && is(args, &["ecr", "describe-images"]))
        .returning(|_, _| {
            Err(failed(
                Tool::Aws,
                "An error occurred (ImageNotFoundException) when calling the DescribeImages operation",
            ))
        });
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_secs(2),
        max_delay: Duration::from_secs(30),
    }
}

#[tokio::test(start_paused = true)]
async fn publish_pushes_revision_and_latest() {
    let mut mock = MockExecutor::new();
    expect_login_and_missing_tag(&mut mock, Arc::new(AtomicU32::new(0)));

    let pushed = Arc::new(Mutex::new(Vec::new()));
    let sink = pushed.clone();
    mock.expect_exec()
        .withf(|tool, args| *tool == Tool::Docker && is(args, &["push"]))
        .returning(move |_, args| {
            sink.lock().unwrap().push(args[1].clone());
            Ok(String::new())
        });
    mock.expect_exec()
        .withf(|tool, args| *tool == Tool::Docker && is(args, &["tag"]))
        .times(1)
        .returning(|_, args| {
            assert!(args[1].ends_with(":abc1234"));
            assert!(args[2].ends_with(":latest"));
            Ok(String::new())
        });

    let publisher = RegistryPublisher::new(mock, "eu-west-1", fast_policy(), true);
    let published = publisher.publish(&artifact("abc1234")).await.unwrap();

    assert!(!published.already_present);
    assert!(published.latest_pushed);
    assert_eq!(published.deployable(), &artifact("abc1234"));
    assert_eq!(
        *pushed.lock().unwrap(),
        vec![
            format!("{REGISTRY}/storefront:abc1234"),
            format!("{REGISTRY}/storefront:latest"),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn publish_never_overwrites_existing_immutable_tag() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|tool, args| *tool == Tool::Aws && is(args, &["ecr", "get-login-password"]))
        .returning(|_, _| Ok("token".to_owned()));
    mock.expect_exec_with_stdin()
        .returning(|_, _, _| Ok(String::new()));
    mock.expect_exec()
        .withf(|tool, args| *tool == Tool::Aws && is(args, &["ecr", "describe-images"]))
        .returning(|_, _| Ok(r#"{"imageDetails":[{"imageTags":["abc1234"]}]}"#.to_owned()));
    mock.expect_exec()
        .withf(|tool, args| *tool == Tool::Docker && is(args, &["push"]))
        .times(0)
        .returning(|_, _| Ok(String::new()));

    let publisher = RegistryPublisher::new(mock, "eu-west-1", fast_policy(), false);
    let published = publisher.publish(&artifact("abc1234")).await.unwrap();

    assert!(published.already_present);
    assert!(!published.latest_pushed);
}

#[tokio::test(start_paused = true)]
async fn publish_retries_transient_failures_with_growing_delays() {
    let mut mock = MockExecutor::new();
    expect_login_and_missing_tag(&mut mock, Arc::new(AtomicU32::new(0)));

    let attempts = Arc::new(Mutex::new(Vec::new()));
    let sink = attempts.clone();
    mock.expect_exec()
        .withf(|tool, args| *tool == Tool::Docker && is(args, &["push"]))
        .returning(move |_, _| {
            let mut seen = sink.lock().unwrap();
            seen.push(tokio::time::Instant::now());
            if seen.len() <= 2 {
                Err(failed(
                    Tool::Docker,
                    "received unexpected HTTP status: 503 Service Unavailable",
                ))
            } else {
                Ok(String::new())
            }
        });

    let publisher = RegistryPublisher::new(mock, "eu-west-1", fast_policy(), false);
    let published = publisher.publish(&artifact("abc1234")).await.unwrap();
    assert!(!published.already_present);

    let seen = attempts.lock().unwrap();
    assert_eq!(seen.len(), 3);
    let delays: Vec<Duration> = seen.windows(2).map(|w| w[1] - w[0]).collect();
    assert!(delays.windows(2).all(|d| d[0] <= d[1]), "{delays:?}");
    assert!(delays[0] >= Duration::from_secs(2));
    assert!(delays[1] >= Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn publish_refreshes_credentials_after_auth_failure() {
    let mut mock = MockExecutor::new();
    let logins = Arc::new(AtomicU32::new(0));
    expect_login_and_missing_tag(&mut mock, logins.clone());

    let calls = Arc::new(AtomicU32::new(0));
    mock.expect_exec()
        .withf(|tool, args| *tool == Tool::Docker && is(args, &["push"]))
        .returning(move |_, _| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(failed(
                    Tool::Docker,
                    "denied: Your authorization token has expired. Reauthenticate and try again.",
                ))
            } else {
                Ok(String::new())
            }
        });

    let publisher = RegistryPublisher::new(mock, "eu-west-1", fast_policy(), false);
    publisher.publish(&artifact("abc1234")).await.unwrap();

    assert_eq!(logins.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn publish_gives_up_after_exhausting_attempts() {
    let mut mock = MockExecutor::new();
    expect_login_and_missing_tag(&mut mock, Arc::new(AtomicU32::new(0)));
    mock.expect_exec()
        .withf(|tool, args| *tool == Tool::Docker && is(args, &["push"]))
        .times(3)
        .returning(|_, _| Err(failed(Tool::Docker, "net/http: TLS handshake timeout")));

    let publisher = RegistryPublisher::new(mock, "eu-west-1", fast_policy(), true);
    let err = publisher.publish(&artifact("abc1234")).await.unwrap_err();

    let PublishError::Failed { attempts, .. } = &err;
    assert_eq!(*attempts, 3);
    assert!(err.diagnostics().unwrap().contains("TLS handshake timeout"));
}

#[tokio::test(start_paused = true)]
async fn publish_does_not_retry_permanent_failures() {
    let mut mock = MockExecutor::new();
    expect_login_and_missing_tag(&mut mock, Arc::new(AtomicU32::new(0)));
    mock.expect_exec()
        .withf(|tool, args| *tool == Tool::Docker && is(args, &["push"]))
        .times(1)
        .returning(|_, _| Err(failed(Tool::Docker, "manifest invalid: manifest blob unknown")));

    let publisher = RegistryPublisher::new(mock, "eu-west-1", fast_policy(), true);
    let err = publisher.publish(&artifact("abc1234")).await.unwrap_err();

    let PublishError::Failed { attempts, .. } = err;
    assert_eq!(attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn latest_failure_is_best_effort() {
    let mut mock = MockExecutor::new();
    expect_login_and_missing_tag(&mut mock, Arc::new(AtomicU32::new(0)));
    mock.expect_exec()
        .withf(|tool, args| *tool == Tool::Docker && is(args, &["push"]))
        .returning(|_, args| {
            if args[1].ends_with(":latest") {
                Err(failed(Tool::Docker, "tag invalid: latest is immutable"))
            } else {
                Ok(String::new())
            }
        });
    mock.expect_exec()
        .withf(|tool, args| *tool == Tool::Docker && is(args, &["tag"]))
        .returning(|_, _| Ok(String::new()));

    let publisher = RegistryPublisher::new(mock, "eu-west-1", fast_policy(), true);
    let published = publisher.publish(&artifact("abc1234")).await.unwrap();

    assert!(!published.latest_pushed);
    assert_eq!(published.deployable().tag, "abc1234");
}

#[test]
fn classify_registry_failures() {
    assert_eq!(
        classify(&failed(Tool::Docker, "unauthorized: authentication required")),
        FailureClass::Auth
    );
    assert_eq!(
        classify(&failed(Tool::Docker, "no basic auth credentials")),
        FailureClass::Auth
    );
    assert_eq!(
        classify(&failed(Tool::Docker, "received unexpected HTTP status: 502 Bad Gateway")),
        FailureClass::Transient
    );
    assert_eq!(
        classify(&failed(Tool::Docker, "read: connection reset by peer")),
        FailureClass::Transient
    );
    assert_eq!(
        classify(&failed(Tool::Docker, "name unknown: The repository does not exist")),
        FailureClass::Permanent
    );
    assert_eq!(
        classify(&ToolError::NotFound {
            tool: Tool::Docker,
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        }),
        FailureClass::Permanent
    );
}

fn push_failed(stderr: &str) -> ToolError {
    ToolError::CommandFailed {
        tool: Tool::Docker,
        args: vec![],
        stdout: "The push refers to repository [140150061234.dkr.ecr.us-east-1.amazonaws.com/storefront]\n\
                 a3f5009c2b11: Preparing\n\
                 5f70bf18a086: Preparing\n\
                 e4031a2b5003: Layer already exists\n"
            .to_owned(),
        stderr: stderr.to_owned(),
    }
}

#[test]
fn classify_ignores_digits_in_push_transcript() {
    assert_eq!(
        classify(&push_failed("manifest invalid: manifest blob unknown")),
        FailureClass::Permanent
    );
    assert_eq!(
        classify(&failed(
            Tool::Aws,
            "An error occurred (RepositoryNotFoundException) when calling the DescribeImages \
             operation: The repository with name 'storefront' does not exist in the registry \
             with id '140150061234'",
        )),
        FailureClass::Permanent
    );
}

#[test]
fn classify_reads_status_codes_in_context() {
    assert_eq!(
        classify(&push_failed("error parsing HTTP 403 response body: unexpected end of JSON input")),
        FailureClass::Auth
    );
    assert_eq!(
        classify(&push_failed("received unexpected HTTP status: 500 Internal Server Error")),
        FailureClass::Transient
    );
    assert_eq!(
        classify(&push_failed("unexpected status code 429 Too Many Requests")),
        FailureClass::Transient
    );
    assert_eq!(
        classify(&push_failed("received unexpected HTTP status: 400 Bad Request")),
        FailureClass::Permanent
    );
}

#[tokio::test(start_paused = true)]
async fn publish_does_not_retry_permanent_failure_behind_push_transcript() {
    let mut mock = MockExecutor::new();
    let logins = Arc::new(AtomicU32::new(0));
    expect_login_and_missing_tag(&mut mock, logins.clone());
    mock.expect_exec()
        .withf(|tool, args| *tool == Tool::Docker && is(args, &["push"]))
        .times(1)
        .returning(|_, _| Err(push_failed("manifest invalid: manifest blob unknown")));

    let publisher = RegistryPublisher::new(mock, "eu-west-1", fast_policy(), false);
    let err = publisher.publish(&artifact("abc1234")).await.unwrap_err();

    let PublishError::Failed { attempts, .. } = err;
    assert_eq!(attempts, 1);
    assert_eq!(logins.load(Ordering::SeqCst), 1);
}

// ── Control plane ──

const REGISTER_RESPONSE: &str = r#"{
  "taskDefinition": {
    "taskDefinitionArn": "arn:aws:ecs:eu-west-1:123456789012:task-definition/storefront:42",
    "family": "storefront",
    "revision": 42,
    "status": "ACTIVE"
  }
}"#;

const UPDATE_RESPONSE: &str = r#"{
  "service": {
    "serviceName": "storefront",
    "runningCount": 2,
    "desiredCount": 2,
    "taskDefinition": "arn:aws:ecs:eu-west-1:123456789012:task-definition/storefront:42",
    "deployments": [
      { "id": "ecs-svc/111", "status": "PRIMARY", "taskDefinition": "arn:aws:ecs:eu-west-1:123456789012:task-definition/storefront:42", "runningCount": 0, "desiredCount": 2, "rolloutState": "IN_PROGRESS" },
      { "id": "ecs-svc/000", "status": "ACTIVE", "taskDefinition": "arn:aws:ecs:eu-west-1:123456789012:task-definition/storefront:41", "runningCount": 2, "desiredCount": 2, "rolloutState": "COMPLETED" }
    ]
  }
}"#;

const DESCRIBE_RESPONSE: &str = r#"{
  "services": [{
    "serviceName": "storefront",
    "runningCount": 2,
    "desiredCount": 2,
    "taskDefinition": "arn:aws:ecs:eu-west-1:123456789012:task-definition/storefront:42",
    "deployments": [
      { "id": "ecs-svc/111", "status": "PRIMARY", "taskDefinition": "arn:aws:ecs:eu-west-1:123456789012:task-definition/storefront:42", "runningCount": 1, "desiredCount": 2, "rolloutState": "IN_PROGRESS" },
      { "id": "ecs-svc/000", "status": "ACTIVE", "taskDefinition": "arn:aws:ecs:eu-west-1:123456789012:task-definition/storefront:41", "runningCount": 1, "desiredCount": 0, "rolloutState": "COMPLETED" }
    ]
  }],
  "failures": []
}"#;

#[tokio::test]
async fn register_returns_new_revision() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|tool, args| {
            *tool == Tool::Aws
                && is(args, &["ecs", "register-task-definition"])
                && args.iter().any(|a| a == "--cli-input-json")
                && args.iter().any(|a| a.contains("\"family\""))
        })
        .returning(|_, _| Ok(REGISTER_RESPONSE.to_owned()));

    let cp = EcsControlPlane::new(mock, "eu-west-1");
    let registered = cp
        .register_definition(r#"{"family":"storefront","containerDefinitions":[]}"#)
        .await
        .unwrap();

    assert_eq!(registered.family, "storefront");
    assert_eq!(registered.revision, 42);
    assert!(registered.id.ends_with("task-definition/storefront:42"));
}

#[tokio::test]
async fn register_rejection_carries_control_plane_body() {
    let mut mock = MockExecutor::new();
    mock.expect_exec().returning(|_, _| {
        Err(failed(
            Tool::Aws,
            "An error occurred (ClientException) when calling the RegisterTaskDefinition operation: Invalid 'cpu' setting for task.",
        ))
    });

    let cp = EcsControlPlane::new(mock, "eu-west-1");
    let err = cp.register_definition("{}").await.unwrap_err();

    assert!(matches!(err, ControlPlaneError::Rejected { .. }));
    assert!(err.body().unwrap().contains("Invalid 'cpu' setting"));
}

#[tokio::test]
async fn update_forces_new_deployment_and_returns_primary_id() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|tool, args| {
            *tool == Tool::Aws
                && is(args, &["ecs", "update-service"])
                && args.iter().any(|a| a == "--force-new-deployment")
                && args.windows(2).any(|w| w[0] == "--cluster" && w[1] == "prod")
                && args.windows(2).any(|w| w[0] == "--service" && w[1] == "storefront")
        })
        .returning(|_, _| Ok(UPDATE_RESPONSE.to_owned()));

    let cp = EcsControlPlane::new(mock, "eu-west-1");
    let operation = cp
        .update_service("prod", "storefront", "storefront:42", true)
        .await
        .unwrap();

    assert_eq!(operation, "ecs-svc/111");
}

#[tokio::test]
async fn describe_reports_deployments() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|tool, args| *tool == Tool::Aws && is(args, &["ecs", "describe-services"]))
        .returning(|_, _| Ok(DESCRIBE_RESPONSE.to_owned()));

    let cp = EcsControlPlane::new(mock, "eu-west-1");
    let status = cp.describe_service("prod", "storefront").await.unwrap();

    assert_eq!(status.desired_count, 2);
    assert_eq!(status.deployments.len(), 2);
    let primary = status.primary().unwrap();
    assert_eq!(primary.id, "ecs-svc/111");
    assert_eq!(primary.rollout_state.as_deref(), Some("IN_PROGRESS"));
    assert!(!status.has_converged_on(&primary.revision_id));
}

#[tokio::test]
async fn describe_missing_service_is_rejected() {
    let mut mock = MockExecutor::new();
    mock.expect_exec().returning(|_, _| {
        Ok(r#"{"services": [], "failures": [{"arn": "arn:aws:ecs:eu-west-1:123456789012:service/prod/storefront", "reason": "MISSING"}]}"#.to_owned())
    });

    let cp = EcsControlPlane::new(mock, "eu-west-1");
    let err = cp.describe_service("prod", "storefront").await.unwrap_err();

    assert!(err.body().unwrap().contains("MISSING"));
}

#[tokio::test]
async fn malformed_response_is_reported() {
    let mut mock = MockExecutor::new();
    mock.expect_exec().returning(|_, _| Ok("not json".to_owned()));

    let cp = EcsControlPlane::new(mock, "eu-west-1");
    let err = cp.describe_service("prod", "storefront").await.unwrap_err();

    assert!(matches!(err, ControlPlaneError::Malformed { .. }));
}

// ── Doctor ──

#[tokio::test]
async fn doctor_all_tool_checks_pass() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|tool, args| *tool == Tool::Docker && is(args, &["version"]))
        .returning(|_, _| Ok("27.3.1\n".to_owned()));
    mock.expect_exec()
        .withf(|tool, args| *tool == Tool::Aws && is(args, &["--version"]))
        .returning(|_, _| Ok("aws-cli/2.15.0 Python/3.11.6 Linux/6.5 exe/x86_64\n".to_owned()));
    mock.expect_exec()
        .withf(|tool, args| *tool == Tool::Aws && is(args, &["sts", "get-caller-identity"]))
        .returning(|_, _| Ok("123456789012\n".to_owned()));

    let report = doctor(&mock, Some("123456789012")).await;

    assert!(report.docker.passed);
    assert_eq!(report.docker.detail, "27.3.1");
    assert_eq!(report.aws.detail, "aws-cli/2.15.0");
    assert!(report.identity.passed);
}

#[tokio::test]
async fn doctor_flags_account_mismatch() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|tool, _| *tool == Tool::Docker)
        .returning(|_, _| Ok("27.3.1\n".to_owned()));
    mock.expect_exec()
        .withf(|tool, args| *tool == Tool::Aws && is(args, &["--version"]))
        .returning(|_, _| Ok("aws-cli/2.15.0\n".to_owned()));
    mock.expect_exec()
        .withf(|tool, args| *tool == Tool::Aws && is(args, &["sts"]))
        .returning(|_, _| Ok("999999999999\n".to_owned()));

    let report = doctor(&mock, Some("123456789012")).await;

    assert!(!report.identity.passed);
    assert!(report.identity.detail.contains("does not match"));
}

#[tokio::test]
async fn doctor_skips_identity_without_aws_cli() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|tool, _| *tool == Tool::Docker)
        .returning(|_, _| Ok("27.3.1\n".to_owned()));
    mock.expect_exec()
        .withf(|tool, _| *tool == Tool::Aws)
        .returning(|_, _| {
            Err(ToolError::NotFound {
                tool: Tool::Aws,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            })
        });

    let report = doctor(&mock, None).await;

    assert!(report.docker.passed);
    assert!(!report.aws.passed);
    assert!(!report.identity.passed);
    assert!(!report.all_passed());
}

//! Integration tests for diceyml

use diceyml::validate::{basic_validate, fieldname_validate, missing_dependency_validate};
use diceyml::{
    DiceYaml, EnvSelector, Error, L4Protocol, Object, ValidationError, merge_env,
};
use indexmap::IndexMap;

const WEB_YML: &str = r#"version: "2.0"
envs:
  TERMINUS_APP_NAME: "TEST-global"
  TEST_PARAM: "param_value"
services:
  web:
    ports:
      - 8080
      - port: 20880
      - port: 1234
        protocol: "UDP"
      - port: 4321
        protocol: "HTTP"
      - port: 53
        protocol: "DNS"
        l4_protocol: "UDP"
        default: true
    k8s_snippet:
      container:
        stdin: true
        workingDir: aaa
        imagePullPolicy: Always
        securityContext:
          privileged: true
    health_check:
      exec:
        cmd: "echo 1"
    deployments:
      replicas: ${replicas}
    resources:
      cpu: ${cpu:0.1}
      mem: 512
      disk: 0
    expose:
      - 20880
    volumes:
      - storage: "nfs"
        path: "/data/file/resource"
addons:
  terminus-elasticsearch:
    plan: "terminus-elasticsearch:professional"
    options:
      version: "6.8.9"
  apigateway:
    plan: "api-gateway:basic"
    options:
      version: "2.0.0"
  xxx:
    plan: ${mysql-plan:"mysql:basic"}
    options:
      version: "5.7.23"
values:
  test:
    replicas: 1
    cpu: 0.5
  production:
    replicas: 2
    cpu: 1
    mysql-plan: "rds:basic"
"#;

const JOB_YML: &str = r#"version: 2.0
jobs:
  job1:
    cmd: ls
    envs:
      env1: v1
  job2:
    cmd: ls -l
    envs:
      env2: v2
"#;

const OVERLAY_YML: &str = r#"environments:
  development:
    addons:
      mysql:
        as: MYSQL
        options:
          create_dbs: mall_eevee
          version: 5.7.29
        plan: mysql:basic
      oss:
        options:
          version: 1.0.0
        plan: alicloud-oss:basic
    envs:
      OSS_ENABLE: true
envs:
  CSRF_ENABLE: true
  ENABLE_SSR: false
  OSS_ENABLE: false
jobs: {}
services:
  gaia-mall:
    depends_on:
    - herd
    deployments:
      replicas: 1
    expose:
    - 80
    health_check:
      http:
        duration: 120
        path: /health/check
        port: 80
    image: registry.example.com/gaia-mall
    ports:
    - 80
    resources:
      cpu: 0.2
      disk: 4096
      mem: 512
  herd:
    deployments:
      replicas: 1
    health_check:
      http:
        duration: 120
        path: /health/check
        port: 8081
    image: registry.example.com/herd
    ports:
    - 8081
    resources:
      cpu: 0.2
      disk: 10
      mem: 512
addons:
  mysql:
    plan: mysql:small
  mysql-ro:
    plan: mysql:large
  cache:
    plan: redis:basic
version: 2
"#;

fn map(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_port_protocols() {
    let dice = DiceYaml::new(WEB_YML, true).unwrap();
    let obj = dice.obj();
    let ports = &obj.services["web"].ports;

    let protocols: Vec<(&str, L4Protocol)> = ports
        .iter()
        .map(|p| (p.protocol.as_str(), p.l4_protocol))
        .collect();
    assert_eq!(
        protocols,
        vec![
            ("TCP", L4Protocol::Tcp),
            ("TCP", L4Protocol::Tcp),
            ("UDP", L4Protocol::Udp),
            ("HTTP", L4Protocol::Tcp),
            ("DNS", L4Protocol::Udp),
        ]
    );
    assert!(ports[4].default);
    assert!(ports[0].expose);
}

#[test]
fn test_k8s_snippet() {
    let dice = DiceYaml::new(WEB_YML, true).unwrap();
    let obj = dice.obj();
    let snippet = obj.services["web"].k8s_snippet.as_ref().unwrap();
    let container = snippet.container.as_ref().unwrap();

    assert_eq!(
        container.get("imagePullPolicy").and_then(|v| v.as_str()),
        Some("Always")
    );
    let privileged = container
        .get("securityContext")
        .and_then(|ctx| ctx.get("privileged"))
        .and_then(|v| v.as_bool());
    assert_eq!(privileged, Some(true));
}

#[test]
fn test_platform_managed_container_fields_rejected() {
    let wrong = WEB_YML.replace("        stdin: true\n", "        name: abc\n        stdin: true\n");
    let err = DiceYaml::new(&wrong, true).unwrap_err();
    let Error::Validation(errors) = err else {
        panic!("expected validation error, got {err}");
    };
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors.errors().next(),
        Some(ValidationError::UnknownFields { path, fields })
            if path == "services.web.k8s_snippet.container" && fields == &["name"]
    ));
}

#[test]
fn test_new_uses_defaults_and_first_values() {
    let obj = DiceYaml::new(WEB_YML, true).unwrap().obj();
    let web = &obj.services["web"];
    assert_eq!(web.resources.cpu, 0.1);
    assert_eq!(web.deployments.replicas, 1);
    assert_eq!(obj.addons["xxx"].plan, "mysql:basic");
}

#[test]
fn test_new_deployable_selects_values() {
    let obj = DiceYaml::new_deployable(WEB_YML, "test", true).unwrap().obj();
    assert_eq!(obj.services["web"].resources.cpu, 0.5);
    assert_eq!(obj.services["web"].deployments.replicas, 1);
    assert_eq!(obj.addons["xxx"].plan, "mysql:basic");
    assert_eq!(obj.services["web"].envs["TEST_PARAM"], "param_value");

    let obj = DiceYaml::new_deployable(WEB_YML, "prod", true).unwrap().obj();
    assert_eq!(obj.services["web"].resources.cpu, 1.0);
    assert_eq!(obj.services["web"].deployments.replicas, 2);
    assert_eq!(obj.addons["xxx"].plan, "rds:basic");
    assert!(obj.values.is_empty());
}

#[test]
fn test_fieldname_validate_reports_each_map() {
    let text = r#"
version: "2.0"
service:
  web: {}
services:
  web:
    image: nginx
    replicas: 2
    resources:
      cpu: 1
      mem: 128
      gpu: 1
    health_check:
      http:
        port: 80
        timeout: 5
"#;
    let raw: serde_yaml::Value = serde_yaml::from_str(text).unwrap();
    let errors = fieldname_validate(&raw);
    assert_eq!(errors.len(), 4);

    let paths: Vec<String> = errors
        .errors()
        .map(|e| match e {
            ValidationError::UnknownFields { path, .. } => path.clone(),
            other => panic!("unexpected finding {other}"),
        })
        .collect();
    assert_eq!(
        paths,
        vec![
            "document",
            "services.web",
            "services.web.resources",
            "services.web.health_check.http",
        ]
    );
}

#[test]
fn test_empty_document() {
    let mut obj = Object::default();
    assert_eq!(basic_validate(&mut obj).len(), 1);

    let err = DiceYaml::new("", true).unwrap_err();
    assert!(matches!(err, Error::Validation(errors) if errors.len() == 1));
}

#[test]
fn test_insert_job_image() {
    let mut dice = DiceYaml::new(JOB_YML, false).unwrap();
    dice.insert_image(&map(&[("job1", "image1")]), &IndexMap::new())
        .unwrap();
    let obj = dice.obj();
    assert_eq!(obj.jobs["job1"].image, "image1");
    assert!(obj.jobs["job2"].image.is_empty());
}

#[test]
fn test_insert_addon_options() {
    let mut dice = DiceYaml::new(OVERLAY_YML, true).unwrap();
    let updated = dice.insert_addon_options(&EnvSelector::Base, "mysql", &map(&[("op3", "op3v")]));
    assert_eq!(updated, 2);

    let obj = dice.obj();
    assert_eq!(obj.addons["mysql"].options["op3"], "op3v");
    assert_eq!(obj.addons["mysql-ro"].options["op3"], "op3v");
    assert!(!obj.addons["cache"].options.contains_key("op3"));
    let overlay = &obj.environments["development"];
    assert!(!overlay.addons["mysql"].options.contains_key("op3"));
}

#[test]
fn test_environment_overlay() {
    let dice = DiceYaml::new(OVERLAY_YML, true).unwrap();
    let obj = dice.obj();
    assert_eq!(obj.environments["development"].envs["OSS_ENABLE"], "true");
    assert_eq!(obj.envs["OSS_ENABLE"], "false");

    let json: serde_json::Value = serde_json::from_str(&dice.json().unwrap()).unwrap();
    assert_eq!(json["environments"]["development"]["envs"]["OSS_ENABLE"], "true");

    let deployed = DiceYaml::new_deployable(OVERLAY_YML, "dev", true).unwrap().obj();
    assert_eq!(deployed.envs["OSS_ENABLE"], "true");
    assert_eq!(deployed.services["herd"].envs["CSRF_ENABLE"], "true");
    assert_eq!(
        deployed.addons.keys().collect::<Vec<_>>(),
        vec!["mysql", "oss"]
    );
    assert_eq!(deployed.addons["mysql"].as_name, "MYSQL");
}

#[test]
fn test_merge_env_absent_is_noop() {
    let mut obj = DiceYaml::new(OVERLAY_YML, true).unwrap().obj();
    let before = obj.clone();
    assert!(!merge_env(&mut obj, "production"));
    assert_eq!(obj, before);
}

#[test]
fn test_compose_scale_overlay() {
    let mut dice = DiceYaml::new(OVERLAY_YML, true).unwrap();
    let scale = DiceYaml::new(
        "services:\n  herd:\n    deployments:\n      replicas: 3\n",
        false,
    )
    .unwrap();
    dice.compose("production", &scale);

    let obj = dice.obj();
    assert_eq!(obj.services["herd"].deployments.replicas, 1);
    assert_eq!(
        obj.environments["production"].services["herd"].deployments.replicas,
        3
    );

    let deployed = DiceYaml::new_deployable(&dice.yaml().unwrap(), "production", true)
        .unwrap()
        .obj();
    assert_eq!(deployed.services["herd"].deployments.replicas, 3);
    assert_eq!(deployed.services["herd"].resources.mem, 512);
}

#[test]
fn test_cycle_detection() {
    let text = r#"
services:
  a:
    depends_on: [b, c]
  b:
    depends_on: [c]
  c:
    depends_on: [a]
"#;
    let dice = DiceYaml::new(text, false).unwrap();
    let cycle = dice.find_cycle().unwrap();
    assert_eq!(cycle.len(), 4);
    assert_eq!(cycle.first(), cycle.last());

    let acyclic = DiceYaml::new(OVERLAY_YML, true).unwrap();
    assert!(acyclic.find_cycle().is_none());
    assert_eq!(
        acyclic.dependency_graph().startup_order().unwrap(),
        vec!["herd", "gaia-mall"]
    );
}

#[test]
fn test_missing_dependency_reported_once() {
    let text = OVERLAY_YML.replace("    - herd\n", "    - herd\n    - ghost\n");
    let mut obj = DiceYaml::new(&text, false).unwrap().obj();
    let errors = missing_dependency_validate(&mut obj);
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors.errors().next(),
        Some(ValidationError::MissingDependency { service, dependency })
            if service == "gaia-mall" && dependency == "ghost"
    ));
}

#[test]
fn test_render_platform() {
    let text = OVERLAY_YML.replace(
        "    image: registry.example.com/herd\n",
        "    image: ${platform.REGISTRY}/herd\n",
    );
    let mut dice = DiceYaml::new_deployable(&text, "dev", true).unwrap();

    let err = dice.render_platform(&IndexMap::new()).unwrap_err();
    assert!(matches!(err, Error::UnresolvedPlatform(keys) if keys == ["REGISTRY"]));

    dice.render_platform(&map(&[("REGISTRY", "registry.internal")]))
        .unwrap();
    assert_eq!(dice.obj().services["herd"].image, "registry.internal/herd");
}

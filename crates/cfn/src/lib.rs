use serde_json::{json, Map as JsonMap, Value as Json};
use serde_yaml::Value as Yaml;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum CfnError {
    #[error("read {}: {source}", .path.display())]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("parse JSON {}: {source}", .path.display())]
    Json { path: PathBuf, #[source] source: serde_json::Error },
    #[error("parse YAML {}: {source}", .path.display())]
    Yaml { path: PathBuf, #[source] source: serde_yaml::Error },
    #[error("{} has no Resources section", .path.display())]
    NoResources { path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format { Json, Yaml, Unknown }

impl Format {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|s| s.to_str()) {
            Some("json") => Format::Json,
            Some("yaml") | Some("yml") | Some("template") => Format::Yaml,
            _ => Format::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template { pub path: PathBuf, pub body: Json }

/// A declared resource borrowed from its template.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CfnResource<'a> {
    pub logical_id: &'a str,
    pub type_name: &'a str,
    pub conf: &'a Json,
}

pub fn load_template(path: &Path) -> Result<Template, CfnError> {
    let src = std::fs::read_to_string(path)
        .map_err(|source| CfnError::Io { path: path.to_path_buf(), source })?;
    parse_template(path, &src)
}

pub fn parse_template(path: &Path, src: &str) -> Result<Template, CfnError> {
    let json_err = |source| CfnError::Json { path: path.to_path_buf(), source };
    let yaml_err = |source| CfnError::Yaml { path: path.to_path_buf(), source };
    let body = match Format::from_path(path) {
        Format::Json => serde_json::from_str(src).map_err(json_err)?,
        Format::Yaml => yaml_to_json(serde_yaml::from_str(src).map_err(yaml_err)?),
        Format::Unknown => match serde_json::from_str(src) {
            Ok(v) => v,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "not JSON, trying YAML");
                yaml_to_json(serde_yaml::from_str(src).map_err(yaml_err)?)
            }
        },
    };
    Ok(Template { path: path.to_path_buf(), body })
}

impl Template {
    /// Resources from `Resources`, or from `resources.Resources` in Serverless files.
    pub fn resources(&self) -> Result<Vec<CfnResource<'_>>, CfnError> {
        let section = self.body.get("Resources")
            .or_else(|| self.body.get("resources").and_then(|r| r.get("Resources")))
            .and_then(Json::as_object)
            .ok_or_else(|| CfnError::NoResources { path: self.path.clone() })?;
        let mut out = Vec::with_capacity(section.len());
        for (logical_id, conf) in section {
            match conf.get("Type").and_then(Json::as_str) {
                Some(type_name) => out.push(CfnResource { logical_id, type_name, conf }),
                None => warn!(path = %self.path.display(), resource = %logical_id, "resource has no Type, skipping"),
            }
        }
        Ok(out)
    }
}

/// Converts YAML to JSON, expanding short-form intrinsic tags (`!Ref x` -> `{"Ref": x}`).
pub fn yaml_to_json(v: Yaml) -> Json {
    match v {
        Yaml::Null => Json::Null,
        Yaml::Bool(b) => Json::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() { json!(i) }
            else if let Some(u) = n.as_u64() { json!(u) }
            else { n.as_f64().and_then(serde_json::Number::from_f64).map_or(Json::Null, Json::Number) }
        }
        Yaml::String(s) => Json::String(s),
        Yaml::Sequence(seq) => Json::Array(seq.into_iter().map(yaml_to_json).collect()),
        Yaml::Mapping(m) => {
            let mut out = JsonMap::new();
            for (k, v) in m { out.insert(yaml_key(k), yaml_to_json(v)); }
            Json::Object(out)
        }
        Yaml::Tagged(tagged) => {
            let tag = tagged.tag.to_string();
            let name = tag.trim_start_matches('!');
            let value = yaml_to_json(tagged.value);
            match name {
                "Ref" | "Condition" => json!({ name: value }),
                "GetAtt" => match value {
                    Json::String(s) => match s.split_once('.') {
                        Some((res, attr)) => json!({ "Fn::GetAtt": [res, attr] }),
                        None => json!({ "Fn::GetAtt": s }),
                    },
                    other => json!({ "Fn::GetAtt": other }),
                },
                _ => {
                    let key = format!("Fn::{}", name);
                    json!({ key: value })
                }
            }
        }
    }
}

fn yaml_key(k: Yaml) -> String {
    match k {
        Yaml::String(s) => s,
        Yaml::Bool(b) => b.to_string(),
        Yaml::Number(n) => n.to_string(),
        Yaml::Null => "null".to_string(),
        other => serde_yaml::to_string(&other).map(|s| s.trim_end().to_string()).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn short_form_tags_expand() {
        let src = indoc! {r#"
            Resources:
              Repo:
                Type: AWS::ECR::Repository
                Properties:
                  RepositoryName: !Sub "${AWS::StackName}-repo"
                  Tags:
                    - Key: owner
                      Value: !Ref Owner
                    - Key: arn
                      Value: !GetAtt Role.Arn
        "#};
        let t = parse_template(Path::new("t.yaml"), src).unwrap();
        let props = &t.body["Resources"]["Repo"]["Properties"];
        assert_eq!(props["RepositoryName"], json!({"Fn::Sub": "${AWS::StackName}-repo"}));
        assert_eq!(props["Tags"][0]["Value"], json!({"Ref": "Owner"}));
        assert_eq!(props["Tags"][1]["Value"], json!({"Fn::GetAtt": ["Role", "Arn"]}));
    }

    #[test]
    fn unknown_extension_falls_back_to_yaml() {
        let t = parse_template(Path::new("template"), "Resources: {}\n").unwrap();
        assert_eq!(t.body, json!({"Resources": {}}));
        let t = parse_template(Path::new("template"), r#"{"Resources": {}}"#).unwrap();
        assert_eq!(t.body, json!({"Resources": {}}));
    }

    #[test]
    fn json_extension_is_strict() {
        let err = parse_template(Path::new("t.json"), "Resources: {}").unwrap_err();
        assert!(matches!(err, CfnError::Json { .. }));
    }

    #[test]
    fn serverless_resources_are_found() {
        let src = indoc! {r#"
            service: app
            provider:
              name: aws
            resources:
              Resources:
                Repo:
                  Type: AWS::ECR::Repository
                  Properties:
                    RepositoryPolicyText: ${file(./policy.json)}
        "#};
        let t = parse_template(Path::new("serverless.yml"), src).unwrap();
        let res = t.resources().unwrap();
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].logical_id, "Repo");
        assert_eq!(res[0].conf["Properties"]["RepositoryPolicyText"], json!("${file(./policy.json)}"));
    }

    #[test]
    fn untyped_resources_are_skipped() {
        let t = parse_template(Path::new("t.json"), r#"{"Resources": {"A": {"Properties": {}}, "B": {"Type": "AWS::S3::Bucket"}}}"#).unwrap();
        let ids: Vec<_> = t.resources().unwrap().iter().map(|r| r.logical_id).collect();
        assert_eq!(ids, vec!["B"]);
    }

    #[test]
    fn missing_resources_is_an_error() {
        let t = parse_template(Path::new("t.json"), r#"{"Parameters": {}}"#).unwrap();
        assert!(matches!(t.resources(), Err(CfnError::NoResources { .. })));
    }
}

//! Job payload construction.

use comfydeploy_core::request::{FeatureSet, GenerationRequest};
use comfydeploy_core::workflow::WorkflowBuilder;

use crate::config::DeploySettings;
use crate::error::GenerationError;
use crate::messages::JobPayload;

/// Build the submission payload for `request`.
///
/// The workflow text from `builder` must parse as a JSON object; any
/// builder or parse failure is reported as [`GenerationError::Build`]
/// before anything is sent.
pub fn build_payload(
    settings: &DeploySettings,
    builder: &dyn WorkflowBuilder,
    request: &GenerationRequest,
    features: &FeatureSet,
) -> Result<JobPayload, GenerationError> {
    let workflow = builder
        .build(request, features)
        .map_err(|e| GenerationError::Build(e.to_string()))?;

    let workflow_api: serde_json::Value = serde_json::from_str(&workflow)
        .map_err(|e| GenerationError::Build(format!("workflow is not valid JSON: {e}")))?;

    if !workflow_api.is_object() {
        return Err(GenerationError::Build(
            "workflow must be a JSON object keyed by node ID".into(),
        ));
    }

    Ok(JobPayload {
        workflow_id: settings.workflow_id.clone(),
        machine_id: settings.machine_id.clone(),
        workflow_api,
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use comfydeploy_core::error::CoreError;
    use comfydeploy_core::request::DEFAULT_FEATURES;
    use comfydeploy_core::workflow::Txt2ImgWorkflowBuilder;

    use super::*;

    struct FixedBuilder(&'static str);

    impl WorkflowBuilder for FixedBuilder {
        fn build(&self, _: &GenerationRequest, _: &FeatureSet) -> Result<String, CoreError> {
            Ok(self.0.to_string())
        }
    }

    fn settings() -> DeploySettings {
        DeploySettings::new("token", "wf-123", "machine-9")
    }

    fn features() -> FeatureSet {
        FeatureSet::new(DEFAULT_FEATURES.iter().copied())
    }

    #[test]
    fn payload_embeds_parsed_workflow() {
        let payload = build_payload(
            &settings(),
            &Txt2ImgWorkflowBuilder,
            &GenerationRequest::new("a red fox"),
            &features(),
        )
        .unwrap();

        assert_eq!(payload.workflow_id, "wf-123");
        assert_eq!(payload.machine_id, "machine-9");
        assert_eq!(payload.workflow_api["6"]["inputs"]["text"], "a red fox");
    }

    #[test]
    fn malformed_workflow_fails_fast() {
        let result = build_payload(
            &settings(),
            &FixedBuilder("{\"3\": {"),
            &GenerationRequest::new("x"),
            &features(),
        );
        assert_matches!(result, Err(GenerationError::Build(msg)) if msg.contains("not valid JSON"));
    }

    #[test]
    fn non_object_workflow_rejected() {
        let result = build_payload(
            &settings(),
            &FixedBuilder("[1, 2, 3]"),
            &GenerationRequest::new("x"),
            &features(),
        );
        assert_matches!(result, Err(GenerationError::Build(_)));
    }

    #[test]
    fn builder_error_becomes_build_error() {
        let mut request = GenerationRequest::new("x");
        request.required_features = vec!["ipadapter".into()];
        let result = build_payload(&settings(), &Txt2ImgWorkflowBuilder, &request, &features());
        assert_matches!(result, Err(GenerationError::Build(msg)) if msg.contains("ipadapter"));
    }
}

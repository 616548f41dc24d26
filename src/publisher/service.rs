//! Task-hosting service abstraction.
//!
//! `TaskService` is the seam between the publisher and Mechanical Turk.
//! `MturkService` talks to the real API through the AWS SDK;
//! `MockTaskService` serves canned responses in tests.

use crate::error::{AnnotaskError, Result as AnnotaskResult, ServiceError};
use crate::publisher::hit::{Comparator, Environment, HitConfig, HitHandle, QualificationRule};
use async_trait::async_trait;
use aws_config::profile::ProfileFileCredentialsProvider;
use aws_config::BehaviorVersion;
use aws_sdk_mturk::config::{ProvideCredentials, Region};
use aws_sdk_mturk::error::DisplayErrorContext;
use aws_sdk_mturk::primitives::DateTime as SdkDateTime;
use aws_sdk_mturk::types::{
    AssignmentStatus, Comparator as SdkComparator, QualificationRequirement,
};
use aws_sdk_mturk::Client as MturkSdkClient;
use chrono::{DateTime, Utc};
use serde::Serialize;
#[cfg(test)]
use std::collections::VecDeque;
#[cfg(test)]
use std::sync::Mutex;
use tracing::{debug, info};

/// One worker submission as reported by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub assignment_id: Option<String>,
    pub worker_id: Option<String>,
    pub hit_id: Option<String>,
    pub status: Option<String>,
    pub auto_approval_time: Option<DateTime<Utc>>,
    pub accept_time: Option<DateTime<Utc>>,
    pub submit_time: Option<DateTime<Utc>>,
    pub approval_time: Option<DateTime<Utc>>,
    pub rejection_time: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    /// QuestionFormAnswers XML, verbatim.
    pub answer: Option<String>,
    pub requester_feedback: Option<String>,
}

/// Result of one list call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssignmentListing {
    pub num_results: usize,
    /// Pagination token for the next page, when the service returned one.
    pub next_token: Option<String>,
    pub assignments: Vec<Assignment>,
}

/// Task service trait that both real and mock implementations use
#[async_trait]
pub trait TaskService: Send + Sync {
    /// Post a HIT and return its identifiers.
    async fn create_hit(&self, config: &HitConfig) -> Result<HitHandle, ServiceError>;

    /// List assignments of a HIT that are in the Submitted state.
    async fn list_submitted_assignments(
        &self,
        hit_id: &str,
    ) -> Result<AssignmentListing, ServiceError>;
}

/// Mechanical Turk requester API client.
pub struct MturkService {
    client: MturkSdkClient,
}

impl MturkService {
    pub fn new(client: MturkSdkClient) -> Self {
        Self { client }
    }

    /// Build a client for `environment` using a named profile from the local AWS credential store.
    ///
    /// Only the named profile is consulted; environment credentials are never
    /// substituted for it. A profile that cannot be loaded is a `Config` error.
    pub async fn connect(
        profile_name: &str,
        region: &str,
        environment: &Environment,
    ) -> AnnotaskResult<Self> {
        info!(
            "Connecting to MTurk {} with profile '{}'",
            environment, profile_name
        );

        verify_profile(&profile_provider(profile_name), profile_name).await?;

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .credentials_provider(profile_provider(profile_name))
            .region(Region::new(region.to_string()))
            .endpoint_url(environment.endpoint)
            .load()
            .await;

        Ok(Self::new(MturkSdkClient::new(&sdk_config)))
    }
}

fn profile_provider(profile_name: &str) -> ProfileFileCredentialsProvider {
    ProfileFileCredentialsProvider::builder()
        .profile_name(profile_name)
        .build()
}

/// Resolve credentials once so a missing or broken profile fails before any HIT is posted.
async fn verify_profile<P: ProvideCredentials>(
    provider: &P,
    profile_name: &str,
) -> AnnotaskResult<()> {
    provider
        .provide_credentials()
        .await
        .map(|_| debug!("Credential profile '{}' resolved", profile_name))
        .map_err(|e| {
            AnnotaskError::Config(format!(
                "credential profile '{}' could not be loaded: {}",
                profile_name,
                DisplayErrorContext(&e)
            ))
        })
}

fn to_sdk_comparator(comparator: Comparator) -> SdkComparator {
    match comparator {
        Comparator::LessThan => SdkComparator::LessThan,
        Comparator::LessThanOrEqualTo => SdkComparator::LessThanOrEqualTo,
        Comparator::GreaterThan => SdkComparator::GreaterThan,
        Comparator::GreaterThanOrEqualTo => SdkComparator::GreaterThanOrEqualTo,
        Comparator::EqualTo => SdkComparator::EqualTo,
        Comparator::NotEqualTo => SdkComparator::NotEqualTo,
    }
}

#[allow(deprecated)] // RequiredToPreview is still honoured by the API
fn to_sdk_requirement(rule: &QualificationRule) -> Result<QualificationRequirement, ServiceError> {
    QualificationRequirement::builder()
        .qualification_type_id(&rule.qualification_type_id)
        .comparator(to_sdk_comparator(rule.comparator))
        .set_integer_values(Some(rule.integer_values.clone()))
        .required_to_preview(rule.required_to_preview)
        .build()
        .map_err(|e| ServiceError::Rejected(format!("invalid qualification requirement: {e}")))
}

fn to_chrono(time: Option<SdkDateTime>) -> Option<DateTime<Utc>> {
    time.and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
}

#[async_trait]
impl TaskService for MturkService {
    async fn create_hit(&self, config: &HitConfig) -> Result<HitHandle, ServiceError> {
        let requirements = config
            .qualification_requirements
            .iter()
            .map(to_sdk_requirement)
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Creating HIT '{}' with reward {}", config.title, config.reward);

        let output = self
            .client
            .create_hit()
            .max_assignments(config.max_assignments)
            .lifetime_in_seconds(config.lifetime_seconds)
            .assignment_duration_in_seconds(config.assignment_duration_seconds)
            .reward(&config.reward)
            .title(&config.title)
            .keywords(&config.keywords)
            .description(&config.description)
            .question(&config.question_payload)
            .set_qualification_requirements(Some(requirements))
            .auto_approval_delay_in_seconds(config.auto_approval_delay_seconds)
            .send()
            .await
            .map_err(|e| ServiceError::Rejected(format!("CreateHIT failed: {}", DisplayErrorContext(&e))))?;

        let hit = output.hit.ok_or(ServiceError::IncompleteResponse("HIT"))?;

        Ok(HitHandle {
            hit_id: hit.hit_id.ok_or(ServiceError::IncompleteResponse("HITId"))?,
            hit_type_id: hit
                .hit_type_id
                .ok_or(ServiceError::IncompleteResponse("HITTypeId"))?,
        })
    }

    async fn list_submitted_assignments(
        &self,
        hit_id: &str,
    ) -> Result<AssignmentListing, ServiceError> {
        let output = self
            .client
            .list_assignments_for_hit()
            .hit_id(hit_id)
            .assignment_statuses(AssignmentStatus::Submitted)
            .send()
            .await
            .map_err(|e| {
                ServiceError::Rejected(format!(
                    "ListAssignmentsForHIT failed: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        let assignments: Vec<Assignment> = output
            .assignments
            .unwrap_or_default()
            .into_iter()
            .map(|a| Assignment {
                assignment_id: a.assignment_id,
                worker_id: a.worker_id,
                hit_id: a.hit_id,
                status: a.assignment_status.map(|s| s.as_str().to_string()),
                auto_approval_time: to_chrono(a.auto_approval_time),
                accept_time: to_chrono(a.accept_time),
                submit_time: to_chrono(a.submit_time),
                approval_time: to_chrono(a.approval_time),
                rejection_time: to_chrono(a.rejection_time),
                deadline: to_chrono(a.deadline),
                answer: a.answer,
                requester_feedback: a.requester_feedback,
            })
            .collect();

        Ok(AssignmentListing {
            num_results: output
                .num_results
                .map(|n| n.max(0) as usize)
                .unwrap_or(assignments.len()),
            next_token: output.next_token,
            assignments,
        })
    }
}

/// Mock task service for testing: canned responses plus a record of calls.
#[cfg(test)]
#[derive(Default)]
pub struct MockTaskService {
    create_response: Option<Result<HitHandle, ServiceError>>,
    list_responses: Mutex<VecDeque<Result<AssignmentListing, ServiceError>>>,
    created: Mutex<Vec<HitConfig>>,
    listed: Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockTaskService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the response for create_hit()
    pub fn create_hit_ret(mut self, response: Result<HitHandle, ServiceError>) -> Self {
        self.create_response = Some(response);
        self
    }

    /// Queue a response for list_submitted_assignments(); an empty listing is returned once the queue runs dry
    pub fn list_ret(self, response: Result<AssignmentListing, ServiceError>) -> Self {
        if let Ok(mut queue) = self.list_responses.lock() {
            queue.push_back(response);
        }
        self
    }

    /// HIT configurations passed to create_hit(), in call order.
    pub fn created(&self) -> Vec<HitConfig> {
        self.created.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// HIT ids passed to list_submitted_assignments(), in call order.
    pub fn listed(&self) -> Vec<String> {
        self.listed.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
#[async_trait]
impl TaskService for MockTaskService {
    async fn create_hit(&self, config: &HitConfig) -> Result<HitHandle, ServiceError> {
        if let Ok(mut created) = self.created.lock() {
            created.push(config.clone());
        }
        match &self.create_response {
            Some(response) => response.clone(),
            None => Err(ServiceError::Rejected("no canned create response".to_string())),
        }
    }

    async fn list_submitted_assignments(
        &self,
        hit_id: &str,
    ) -> Result<AssignmentListing, ServiceError> {
        if let Ok(mut listed) = self.listed.lock() {
            listed.push(hit_id.to_string());
        }
        self.list_responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or_else(|| Ok(AssignmentListing::default()))
    }
}

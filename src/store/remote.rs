// src/store/remote.rs

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::ExamError;
use crate::models::exam::ExamDefinition;
use crate::models::submission::{LiveSessionRecord, Submission};
use crate::store::ExamStore;

/// The primary remote store: a thin REST client against the
/// monitoring collaborator's document API.
///
/// Entity kinds map to collections (`exams`, `submissions`,
/// `live-sessions`); upserts are `PUT` by id, so repeated commits of
/// the same composite id replace the document.
pub struct HttpStore {
    client: reqwest::Client,
    base: Url,
}

impl HttpStore {
    pub fn new(base: Url) -> Self {
        Self::with_client(reqwest::Client::new(), base)
    }

    pub fn with_client(client: reqwest::Client, base: Url) -> Self {
        Self { client, base }
    }

    fn endpoint(&self, collection: &str, id: Option<&str>) -> Result<Url, ExamError> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ExamError::Transport("store base URL cannot be a base".to_string()))?;
            segments.pop_if_empty().push(collection);
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    fn classify(status: StatusCode, body: String) -> ExamError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ExamError::Authorization(format!(
                "remote store denied the request ({}): {}",
                status, body
            )),
            _ => ExamError::Transport(format!("remote store returned {}: {}", status, body)),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, ExamError> {
        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify(status, body));
        }
        Ok(Some(response.json().await?))
    }

    async fn put_json<T: Serialize + ?Sized>(&self, url: Url, doc: &T) -> Result<(), ExamError> {
        let response = self.client.put(url).json(doc).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify(status, body));
        }
        Ok(())
    }

    async fn delete_doc(&self, url: Url) -> Result<(), ExamError> {
        let response = self.client.delete(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND || response.status().is_success() {
            return Ok(());
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(Self::classify(status, body))
    }
}

#[async_trait]
impl ExamStore for HttpStore {
    async fn get_exam(&self, id: &str) -> Result<Option<ExamDefinition>, ExamError> {
        self.get_json(self.endpoint("exams", Some(id))?).await
    }

    async fn get_submission(&self, id: &str) -> Result<Option<Submission>, ExamError> {
        self.get_json(self.endpoint("submissions", Some(id))?).await
    }

    async fn list_submissions(&self, exam_id: &str) -> Result<Vec<Submission>, ExamError> {
        let mut url = self.endpoint("submissions", None)?;
        url.query_pairs_mut().append_pair("examId", exam_id);
        Ok(self.get_json(url).await?.unwrap_or_default())
    }

    async fn upsert_submission(&self, submission: &Submission) -> Result<(), ExamError> {
        self.put_json(self.endpoint("submissions", Some(&submission.id))?, submission)
            .await
    }

    async fn delete_submission(&self, id: &str) -> Result<(), ExamError> {
        self.delete_doc(self.endpoint("submissions", Some(id))?).await
    }

    async fn list_live_sessions(
        &self,
        exam_id: &str,
    ) -> Result<Vec<LiveSessionRecord>, ExamError> {
        let mut url = self.endpoint("live-sessions", None)?;
        url.query_pairs_mut().append_pair("examId", exam_id);
        Ok(self.get_json(url).await?.unwrap_or_default())
    }

    async fn upsert_live_session(&self, record: &LiveSessionRecord) -> Result<(), ExamError> {
        self.put_json(self.endpoint("live-sessions", Some(&record.key()))?, record)
            .await
    }

    async fn delete_live_session(&self, key: &str) -> Result<(), ExamError> {
        self.delete_doc(self.endpoint("live-sessions", Some(key))?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denied_statuses_classify_separately_from_outages() {
        let unauthorized = HttpStore::classify(StatusCode::UNAUTHORIZED, String::new());
        assert!(matches!(unauthorized, ExamError::Authorization(_)));
        assert!(unauthorized.triggers_failover());

        let forbidden = HttpStore::classify(StatusCode::FORBIDDEN, String::new());
        assert!(matches!(forbidden, ExamError::Authorization(_)));

        let outage = HttpStore::classify(StatusCode::BAD_GATEWAY, String::new());
        assert!(matches!(outage, ExamError::Transport(_)));
        assert!(outage.triggers_failover());
    }

    #[test]
    fn endpoints_nest_under_the_base_path() {
        let store = HttpStore::new(Url::parse("http://monitor.local/api/v1").unwrap());
        let url = store.endpoint("submissions", Some("exam-1_s1")).unwrap();
        assert_eq!(url.as_str(), "http://monitor.local/api/v1/submissions/exam-1_s1");
    }
}

use super::models::{CapacityRecord, Iteration, Team, TeamMember};
use super::CapacityService;
use crate::config::Config;
use crate::error::{config_error, decode_error, transport_error, CalendarResult};
use crate::utils::time::{parse_date, DateRange};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

/// REST API version sent with every request
pub const API_VERSION: &str = "7.1";

/// Page size used when listing teams and members
const PAGE_SIZE: usize = 1000;

#[derive(Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IterationDto {
    id: String,
    name: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    attributes: IterationAttributesDto,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct IterationAttributesDto {
    start_date: Option<String>,
    finish_date: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CapacityResponse {
    #[serde(default, alias = "value")]
    team_members: Vec<MemberCapacityDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemberCapacityDto {
    team_member: IdentityDto,
    #[serde(default)]
    days_off: Vec<DaysOffDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityDto {
    id: String,
    display_name: String,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    unique_name: Option<String>,
}

#[derive(Deserialize)]
struct DaysOffDto {
    start: String,
    end: String,
}

#[derive(Deserialize)]
struct TeamDto {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct TeamMemberDto {
    identity: IdentityDto,
}

/// Azure DevOps work REST client authenticating with a personal access token
#[derive(Clone)]
pub struct AzureDevOpsClient {
    client: Client,
    base_url: Url,
    auth_header: String,
}

impl AzureDevOpsClient {
    pub fn new(host_url: &str, access_token: &str) -> CalendarResult<Self> {
        let mut base_url = Url::parse(host_url)
            .map_err(|e| config_error(&format!("Invalid Azure DevOps URL {}: {}", host_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(config_error(&format!("Azure DevOps URL {} cannot hold a path", host_url)));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let auth_header = format!("Basic {}", STANDARD.encode(format!(":{}", access_token)));

        Ok(Self {
            client: Client::new(),
            base_url,
            auth_header,
        })
    }

    pub fn from_config(config: &Config) -> CalendarResult<Self> {
        Self::new(&config.host_url, &config.access_token)
    }

    /// API URL under the organization for the given path segments
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            path.extend(segments);
        }
        url.query_pairs_mut().append_pair("api-version", API_VERSION);
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> CalendarResult<T> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .header(AUTHORIZATION, &self.auth_header)
            .send()
            .await
            .map_err(|e| transport_error(&format!("Failed to fetch {}: {}", url.path(), e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(transport_error(&format!(
                "Failed to fetch {}: HTTP {} - {}",
                url.path(),
                status,
                error_body
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(&format!("Failed to read {}: {}", url.path(), e)))?;

        serde_json::from_str(&body)
            .map_err(|e| decode_error(&format!("Failed to parse response of {}: {}", url.path(), e)))
    }

    /// Fetch every page of a `$top`/`$skip` listing
    async fn get_paged<T: DeserializeOwned>(&self, segments: &[&str]) -> CalendarResult<Vec<T>> {
        let mut items = Vec::new();
        let mut skip = 0;

        loop {
            let mut url = self.endpoint(segments);
            url.query_pairs_mut()
                .append_pair("$top", &PAGE_SIZE.to_string())
                .append_pair("$skip", &skip.to_string());

            let page: ListResponse<T> = self.get_json(url).await?;
            let count = page.value.len();
            items.extend(page.value);

            if count < PAGE_SIZE {
                break;
            }
            skip += count;
        }

        Ok(items)
    }
}

impl From<IdentityDto> for TeamMember {
    fn from(identity: IdentityDto) -> Self {
        Self {
            id: identity.id,
            display_name: identity.display_name,
            image_url: identity.image_url.unwrap_or_default(),
            unique_name: identity.unique_name,
        }
    }
}

fn to_iteration(dto: IterationDto) -> CalendarResult<Option<Iteration>> {
    let (Some(start), Some(finish)) = (dto.attributes.start_date, dto.attributes.finish_date) else {
        debug!("Skipping unscheduled iteration {}", dto.name);
        return Ok(None);
    };

    let start_date = parse_date(&start).map_err(|e| decode_error(&e.to_string()))?;
    let end_date = parse_date(&finish).map_err(|e| decode_error(&e.to_string()))?;

    Ok(Some(Iteration {
        id: dto.id,
        name: dto.name,
        path: dto.path,
        start_date,
        end_date,
        url: dto.url,
    }))
}

fn to_records(member: MemberCapacityDto) -> CalendarResult<Vec<CapacityRecord>> {
    let identity = TeamMember::from(member.team_member);

    member
        .days_off
        .into_iter()
        .map(|range| {
            let start_date = parse_date(&range.start).map_err(|e| decode_error(&e.to_string()))?;
            let end_date = parse_date(&range.end).map_err(|e| decode_error(&e.to_string()))?;
            Ok(CapacityRecord {
                member_id: identity.id.clone(),
                member_display_name: identity.display_name.clone(),
                member_avatar_url: identity.image_url.clone(),
                start_date,
                end_date,
            })
        })
        .collect()
}

#[async_trait]
impl CapacityService for AzureDevOpsClient {
    async fn get_iterations(&self, project_id: &str, team_id: &str, range: DateRange) -> CalendarResult<Vec<Iteration>> {
        let url = self.endpoint(&[project_id, team_id, "_apis", "work", "teamsettings", "iterations"]);
        let response: ListResponse<IterationDto> = self.get_json(url).await?;

        let mut iterations = Vec::new();
        for dto in response.value {
            if let Some(iteration) = to_iteration(dto)? {
                if iteration.overlaps(&range) {
                    iterations.push(iteration);
                }
            }
        }

        debug!("Fetched {} iterations of team {} for {}", iterations.len(), team_id, range);
        Ok(iterations)
    }

    async fn get_capacity(&self, project_id: &str, team_id: &str, iteration_id: &str) -> CalendarResult<Vec<CapacityRecord>> {
        let url = self.endpoint(&[
            project_id,
            team_id,
            "_apis",
            "work",
            "teamsettings",
            "iterations",
            iteration_id,
            "capacities",
        ]);
        let response: CapacityResponse = self.get_json(url).await?;

        let mut records = Vec::new();
        for member in response.team_members {
            records.extend(to_records(member)?);
        }
        Ok(records)
    }

    async fn get_teams(&self, project_id: &str) -> CalendarResult<Vec<Team>> {
        let teams: Vec<TeamDto> = self.get_paged(&["_apis", "projects", project_id, "teams"]).await?;
        if teams.is_empty() {
            warn!("Project {} has no teams", project_id);
        }
        Ok(teams
            .into_iter()
            .map(|team| Team {
                id: team.id,
                name: team.name,
            })
            .collect())
    }

    async fn get_team(&self, project_id: &str, team_id: &str) -> CalendarResult<Team> {
        let url = self.endpoint(&["_apis", "projects", project_id, "teams", team_id]);
        let team: TeamDto = self.get_json(url).await?;
        Ok(Team {
            id: team.id,
            name: team.name,
        })
    }

    async fn get_team_members(&self, project_id: &str, team_id: &str) -> CalendarResult<Vec<TeamMember>> {
        let members: Vec<TeamMemberDto> = self
            .get_paged(&["_apis", "projects", project_id, "teams", team_id, "members"])
            .await?;
        Ok(members.into_iter().map(|member| member.identity.into()).collect())
    }
}

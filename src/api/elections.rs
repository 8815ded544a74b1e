use log::info;
use rocket::{serde::json::Json, Route, State};

use crate::{
    error::Result,
    model::{
        api::{
            parse_id, CandidateDescription, CandidateSpec, ElectionResults, VoteRequest,
            VoteStatus,
        },
        auth::{Caller, Officer},
        store::{already_voted, Repo, Store},
    },
    notify::{Notification, Notifier},
};

pub fn routes() -> Vec<Route> {
    routes![
        list_candidates,
        add_candidate,
        cast_vote,
        vote_status,
        election_results
    ]
}

#[get("/elections/<election_id>/candidates")]
async fn list_candidates(
    _caller: Caller,
    election_id: &str,
    repo: Repo,
) -> Result<Json<Vec<CandidateDescription>>> {
    let candidates = repo.candidates(election_id).await?;
    Ok(Json(candidates.into_iter().map(Into::into).collect()))
}

#[post("/elections/<election_id>/candidates", data = "<spec>", format = "json")]
async fn add_candidate(
    caller: Caller<Officer>,
    election_id: &str,
    spec: Json<CandidateSpec>,
    repo: Repo,
    notifier: &State<Notifier>,
) -> Result<Json<CandidateDescription>> {
    let candidate = spec.into_inner().into_candidate(election_id)?;
    let candidate = repo.insert_candidate(candidate).await?;
    info!(
        "'{}' added candidate #{} '{}' to election '{election_id}'",
        caller.username, candidate.ballot_number, candidate.name
    );

    notifier.send(Notification::CandidateAdded(&candidate)).await;
    Ok(Json(candidate.into()))
}

#[post("/elections/<election_id>/votes", data = "<vote>", format = "json")]
async fn cast_vote(
    caller: Caller,
    election_id: &str,
    vote: Json<VoteRequest>,
    repo: Repo,
) -> Result<Json<VoteStatus>> {
    let candidate_id = parse_id(&vote.candidate_id, "candidate")?;

    // Cheap early refusal. The store enforces the same rule atomically.
    let existing = repo.vote_record(election_id, caller.id).await?;
    if existing.as_ref().map_or(false, |record| record.has_voted()) {
        return Err(already_voted(election_id));
    }

    let (candidate, record) = repo.cast_vote(election_id, candidate_id, caller.id).await?;
    info!(
        "'{}' voted in election '{election_id}', candidate #{} now has {} votes",
        caller.username, candidate.ballot_number, candidate.vote_count
    );
    Ok(Json(VoteStatus::from_record(election_id, Some(record))))
}

#[get("/elections/<election_id>/votes/mine")]
async fn vote_status(caller: Caller, election_id: &str, repo: Repo) -> Result<Json<VoteStatus>> {
    let record = repo.vote_record(election_id, caller.id).await?;
    Ok(Json(VoteStatus::from_record(election_id, record)))
}

#[get("/elections/<election_id>/results")]
async fn election_results(
    _caller: Caller,
    election_id: &str,
    repo: Repo,
) -> Result<Json<ElectionResults>> {
    let candidates = repo.candidates(election_id).await?;
    Ok(Json(ElectionResults::tally(election_id, candidates)))
}

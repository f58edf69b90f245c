//! `WeightedVoteCheckpoint`: ballots weighted by token balances at a
//! checkpoint.

use crate::abi;
use crate::address::Address;
use crate::assertions::{date_in_future, date_range, ensure, non_zero_address, percentage_in_range};
use crate::contract::{log_param, tokens, Contract};
use crate::conversions::{
    date_to_u256, duration_to_u256, from_wei, percentage_to_u256, u256_to_date,
    u256_to_percentage, u256_to_u64,
};
use crate::error::Result;
use crate::modules::Module;
use crate::network::{BlockReference, Provider};
use crate::transaction_builder::{PendingTransaction, TxDefaults, TxParams};
use chrono::{DateTime, Duration, Utc};
use ethabi::Token;
use ethereum_types::U256;
use rust_decimal::Decimal;
use std::sync::Arc;

/// State of a ballot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BallotDetails {
    /// Share of the checkpoint supply that must vote, in percent
    pub quorum: Decimal,
    /// Voting supply
    pub total_supply_at_checkpoint: Decimal,
    /// Checkpoint the weights are taken at
    pub checkpoint_id: u64,
    /// Voting opens
    pub start_time: DateTime<Utc>,
    /// Voting closes
    pub end_time: DateTime<Utc>,
    /// Number of proposals
    pub total_proposals: u64,
    /// Accounts that voted so far
    pub total_voters: u64,
    /// Whether the ballot has not been cancelled
    pub is_active: bool,
}

impl BallotDetails {
    pub fn is_running(&self, now: DateTime<Utc>) -> bool {
        //! Active and inside the voting window.
        self.is_active && self.start_time <= now && now <= self.end_time
    }
}

/// Tally of a ballot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BallotResults {
    /// Token weight per proposal, proposal 1 first
    pub vote_weighting: Vec<Decimal>,
    /// Proposals tied with the winner
    pub tie_with: Vec<u64>,
    /// Proposal with the highest weight, zero if none
    pub winning_proposal: u64,
    /// Whether the quorum was reached
    pub is_voting_succeed: bool,
    /// Accounts that voted
    pub total_voters: u64,
}

/// `VoteCast` event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VoteCastEvent {
    /// Account that voted
    pub voter: Address,
    /// Token weight of the vote
    pub weight: Decimal,
    /// Ballot voted on
    pub ballot_id: u64,
    /// Chosen proposal
    pub proposal_id: u64,
}

/// Wrapper of a `WeightedVoteCheckpoint` module.
#[derive(Clone, Debug)]
pub struct WeightedVoteCheckpoint {
    contract: Contract,
}

impl Module for WeightedVoteCheckpoint {
    fn contract(&self) -> &Contract {
        &self.contract
    }
}

fn check_ballot_shape(total_proposals: u64, quorum: Decimal) -> Result<()> {
    ensure(total_proposals >= 2, "A ballot needs at least two proposals")?;
    percentage_in_range(quorum, "Quorum")
}

impl WeightedVoteCheckpoint {
    pub fn new(address: Address, provider: Arc<dyn Provider>, defaults: Arc<TxDefaults>) -> Self {
        //! Wrapper of the module deployed at `address`.
        Self {
            contract: Contract::new(address, &abi::WEIGHTED_VOTE_CHECKPOINT, provider, defaults),
        }
    }

    pub const fn address(&self) -> Address {
        //! Module address.
        self.contract.address()
    }

    pub async fn get_ballot_details(&self, ballot_id: u64) -> Result<BallotDetails> {
        //! State of a ballot.
        let mut outputs = self
            .contract
            .call("getBallotDetails", &[tokens::uint(ballot_id)])
            .await?;
        Ok(BallotDetails {
            quorum: u256_to_percentage(outputs.take()?)?,
            total_supply_at_checkpoint: from_wei(outputs.take()?)?,
            checkpoint_id: u256_to_u64(outputs.take()?)?,
            start_time: u256_to_date(outputs.take()?)?,
            end_time: u256_to_date(outputs.take()?)?,
            total_proposals: u256_to_u64(outputs.take()?)?,
            total_voters: u256_to_u64(outputs.take()?)?,
            is_active: outputs.take()?,
        })
    }

    pub async fn get_ballot_results(&self, ballot_id: u64) -> Result<BallotResults> {
        //! Tally of a ballot, complete or not.
        let mut outputs = self
            .contract
            .call("getBallotResults", &[tokens::uint(ballot_id)])
            .await?;
        let weights: Vec<U256> = outputs.take()?;
        Ok(BallotResults {
            vote_weighting: weights
                .into_iter()
                .map(from_wei)
                .collect::<std::result::Result<_, _>>()?,
            tie_with: outputs.take()?,
            winning_proposal: u256_to_u64(outputs.take()?)?,
            is_voting_succeed: outputs.take()?,
            total_voters: u256_to_u64(outputs.take()?)?,
        })
    }

    pub async fn get_selected_proposal(&self, ballot_id: u64, voter: Address) -> Result<u64> {
        //! Proposal chosen by `voter`, zero when they did not vote.
        let proposal = self
            .contract
            .call(
                "getSelectedProposal",
                &[tokens::uint(ballot_id), voter.into()],
            )
            .await?
            .single()?;
        Ok(u256_to_u64(proposal)?)
    }

    pub async fn get_ballots_count(&self) -> Result<u64> {
        //! Number of ballots ever created.
        let count = self.contract.call("getBallotsCount", &[]).await?.single()?;
        Ok(u256_to_u64(count)?)
    }

    pub async fn get_exempted_voters_list(&self, ballot_id: u64) -> Result<Vec<Address>> {
        //! Voters exempted from one ballot.
        self.contract
            .call("getExemptedVotersByBallot", &[tokens::uint(ballot_id)])
            .await?
            .single()
    }

    pub async fn get_default_exempted_voters_list(&self) -> Result<Vec<Address>> {
        //! Voters exempted from every new ballot.
        self.contract
            .call("getDefaultExemptionVotersList", &[])
            .await?
            .single()
    }

    pub async fn is_voter_allowed(&self, ballot_id: u64, voter: Address) -> Result<bool> {
        //! Whether `voter` may vote in the ballot.
        self.contract
            .call("isVoterAllowed", &[tokens::uint(ballot_id), voter.into()])
            .await?
            .single()
    }

    async fn existing_ballot(&self, ballot_id: u64) -> Result<BallotDetails> {
        ensure(
            ballot_id < self.get_ballots_count().await?,
            format!("Ballot {ballot_id} does not exist"),
        )?;
        self.get_ballot_details(ballot_id).await
    }

    pub async fn create_ballot(
        &self,
        duration: Duration,
        total_proposals: u64,
        quorum: Decimal,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Ballot on a fresh checkpoint, open from now on for `duration`.
        ensure(duration > Duration::zero(), "Duration must be positive")?;
        check_ballot_shape(total_proposals, quorum)?;
        self.contract
            .send(
                "createBallot",
                &[
                    tokens::uint(duration_to_u256(duration)?),
                    tokens::uint(total_proposals),
                    tokens::uint(percentage_to_u256(quorum)?),
                ],
                params,
            )
            .await
    }

    pub async fn create_custom_ballot(
        &self,
        checkpoint_id: u64,
        quorum: Decimal,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        total_proposals: u64,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Ballot on an existing checkpoint with an explicit voting window.
        check_ballot_shape(total_proposals, quorum)?;
        date_range(start_time, end_time)?;
        date_in_future(end_time, "End time")?;
        let current = self.security_token().await?.current_checkpoint_id().await?;
        ensure(
            checkpoint_id <= current,
            format!("Checkpoint {checkpoint_id} does not exist yet"),
        )?;
        self.contract
            .send(
                "createCustomBallot",
                &[
                    tokens::uint(checkpoint_id),
                    tokens::uint(percentage_to_u256(quorum)?),
                    tokens::uint(date_to_u256(start_time)?),
                    tokens::uint(date_to_u256(end_time)?),
                    tokens::uint(total_proposals),
                ],
                params,
            )
            .await
    }

    pub async fn cast_vote(
        &self,
        ballot_id: u64,
        proposal_id: u64,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Vote for `proposal_id`, counted from 1.
        let ballot = self.existing_ballot(ballot_id).await?;
        ensure(ballot.is_active, "Ballot is not active")?;
        ensure(
            ballot.is_running(Utc::now()),
            "Ballot is outside its voting window",
        )?;
        ensure(
            (1..=ballot.total_proposals).contains(&proposal_id),
            format!(
                "Proposal must be between 1 and {}",
                ballot.total_proposals
            ),
        )?;
        let voter = self.contract.sender(&params).await?;
        ensure(
            self.get_selected_proposal(ballot_id, voter).await? == 0,
            format!("{voter} has already voted"),
        )?;
        ensure(
            self.is_voter_allowed(ballot_id, voter).await?,
            format!("{voter} is not allowed to vote"),
        )?;
        self.contract
            .send(
                "castVote",
                &[tokens::uint(ballot_id), tokens::uint(proposal_id)],
                params,
            )
            .await
    }

    pub async fn change_ballot_status(
        &self,
        ballot_id: u64,
        is_active: bool,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Cancel or reactivate a ballot. Fails when unchanged.
        let ballot = self.existing_ballot(ballot_id).await?;
        ensure(
            ballot.is_active != is_active,
            format!("Ballot {ballot_id} already has this status"),
        )?;
        self.contract
            .send(
                "changeBallotStatus",
                &[tokens::uint(ballot_id), Token::Bool(is_active)],
                params,
            )
            .await
    }

    pub async fn change_ballot_exempted_voters_list(
        &self,
        ballot_id: u64,
        voter: Address,
        exempt: bool,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Exempt `voter` from one ballot, or lift the exemption.
        non_zero_address(voter, "Voter")?;
        self.existing_ballot(ballot_id).await?;
        self.contract
            .send(
                "changeBallotExemptedVotersList",
                &[tokens::uint(ballot_id), voter.into(), Token::Bool(exempt)],
                params,
            )
            .await
    }

    pub async fn change_default_exempted_voters_list(
        &self,
        voter: Address,
        exempt: bool,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Exempt `voter` from future ballots, or lift the exemption.
        non_zero_address(voter, "Voter")?;
        self.contract
            .send(
                "changeDefaultExemptedVotersList",
                &[voter.into(), Token::Bool(exempt)],
                params,
            )
            .await
    }

    pub async fn vote_cast_logs(
        &self,
        from_block: BlockReference,
        to_block: BlockReference,
    ) -> Result<Vec<VoteCastEvent>> {
        //! `VoteCast` events in the block range.
        self.contract
            .logs("VoteCast", from_block, to_block)
            .await?
            .iter()
            .map(|log| -> Result<VoteCastEvent> {
                Ok(VoteCastEvent {
                    voter: log_param(log, "_voter")?,
                    weight: from_wei(log_param(log, "_weight")?)?,
                    ballot_id: log_param(log, "_ballotId")?,
                    proposal_id: log_param(log, "_proposalId")?,
                })
            })
            .collect()
    }
}

pub mod funding_round;
pub mod industry;
pub mod investor;
pub mod round_investor;
pub mod startup;

pub use funding_round::Entity as FundingRound;
pub use industry::Entity as Industry;
pub use investor::Entity as Investor;
pub use round_investor::Entity as RoundInvestor;
pub use startup::Entity as Startup;

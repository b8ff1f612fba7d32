mod availability;
mod booking;
mod hotel;
mod search;
